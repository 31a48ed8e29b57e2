//! Persistent gesture-pilot settings.
//!
//! Settings live in a JSON file (`gesture-pilot.json` by default). Every
//! section is `#[serde(default)]`, so a partial file only overrides what it
//! names and missing gesture bindings are filled in from the built-in table.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, types::GestureKind};

/// Current config schema version
const CURRENT_VERSION: u32 = 1;

pub const DEFAULT_CONFIG_FILE: &str = "gesture-pilot.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: u32,
    pub detection: DetectionConfig,
    pub clutch: ClutchConfig,
    pub verifier: VerifierConfig,
    pub gestures: BTreeMap<GestureKind, GestureBinding>,
    pub command_presets: BTreeMap<String, Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            detection: DetectionConfig::default(),
            clutch: ClutchConfig::default(),
            verifier: VerifierConfig::default(),
            gestures: default_bindings(),
            command_presets: default_presets(),
        }
    }
}

impl Settings {
    pub fn binding(&self, gesture: GestureKind) -> Option<&GestureBinding> {
        self.gestures.get(&gesture)
    }

    /// Configured description, or the title-cased gesture name.
    pub fn description(&self, gesture: GestureKind) -> String {
        self.binding(gesture)
            .and_then(|b| b.description.clone())
            .unwrap_or_else(|| title_case(gesture.as_str()))
    }

    /// Gesture currently bound to voice dictation, if any. Only one gesture
    /// drives push-to-talk; the first in gesture order wins.
    pub fn voice_gesture(&self) -> Option<GestureKind> {
        self.gestures
            .iter()
            .find(|(_, binding)| binding.effect == GestureEffect::Action(ActionKind::VoiceDictation))
            .map(|(gesture, _)| *gesture)
    }

    fn fill_defaults(&mut self) {
        for (gesture, binding) in default_bindings() {
            self.gestures.entry(gesture).or_insert(binding);
        }
        if self.command_presets.is_empty() {
            self.command_presets = default_presets();
        }
    }
}

/// Thresholds for the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub cooldown_ms: u64,
    pub high_confidence: f32,
    pub medium_confidence: f32,
    pub low_confidence: f32,
    pub gestures: BTreeMap<GestureKind, GestureTuning>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 500,
            high_confidence: 0.80,
            medium_confidence: 0.60,
            low_confidence: 0.40,
            gestures: BTreeMap::new(),
        }
    }
}

impl DetectionConfig {
    pub fn stability_frames(&self, gesture: GestureKind) -> usize {
        self.gestures
            .get(&gesture)
            .and_then(|t| t.stability_frames)
            .unwrap_or(match gesture {
                GestureKind::OpenPalm => 2,
                _ => 3,
            })
            .max(1)
    }

    pub fn skip_verifier_above(&self, gesture: GestureKind) -> f32 {
        self.gestures
            .get(&gesture)
            .and_then(|t| t.skip_verifier_above)
            .unwrap_or(match gesture {
                GestureKind::OpenPalm => 0.75,
                _ => self.high_confidence,
            })
    }
}

/// Per-gesture overrides. Absent fields fall back to the gesture's default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureTuning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stability_frames: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_verifier_above: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClutchConfig {
    pub stable_frames: usize,
}

impl Default for ClutchConfig {
    fn default() -> Self {
        Self {
            stable_frames: crate::clutch::DEFAULT_STABLE_FRAMES,
        }
    }
}

/// Vision-language verifier settings. The API key is read from the
/// environment variable named by `api_key_env`, never stored in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub enabled: bool,
    pub model: String,
    pub api_key_env: String,
    pub sample_interval_ms: u64,
    pub max_dimension: u32,
    pub crop_padding: f32,
    pub jpeg_quality: u8,
    pub timeout_secs: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "gemini-2.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            sample_interval_ms: 500,
            max_dimension: 256,
            crop_padding: 0.2,
            jpeg_quality: 70,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    VoiceDictation,
    ClearInput,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::VoiceDictation => "voice_dictation",
            ActionKind::ClearInput => "clear_input",
        }
    }
}

/// What a gesture does. Serialized as either `"command": "..."` or
/// `"action": "..."` next to the description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureEffect {
    Command(String),
    Action(ActionKind),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureBinding {
    #[serde(flatten)]
    pub effect: GestureEffect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl GestureBinding {
    pub fn command(command: &str, description: &str) -> Self {
        Self {
            effect: GestureEffect::Command(command.to_string()),
            description: Some(description.to_string()),
        }
    }

    pub fn action(action: ActionKind, description: &str) -> Self {
        Self {
            effect: GestureEffect::Action(action),
            description: Some(description.to_string()),
        }
    }
}

pub fn default_bindings() -> BTreeMap<GestureKind, GestureBinding> {
    use GestureKind::*;

    BTreeMap::from([
        (OpenPalm, GestureBinding::action(ActionKind::VoiceDictation, "Voice Input")),
        (PeaceSign, GestureBinding::command("start the dev server", "Start Server")),
        (ThumbsUp, GestureBinding::command("commit and push", "Commit & Push")),
        (ThumbsDown, GestureBinding::action(ActionKind::ClearInput, "Clear Input")),
        (Pointing, GestureBinding::command("kill the running server", "Stop Server")),
        (OkSign, GestureBinding::command("/help", "Help")),
        (RockSign, GestureBinding::command("run tests", "Run Tests")),
        (Shaka, GestureBinding::command("/clear", "Clear Chat")),
        (ThreeFingers, GestureBinding::command("explain this code", "Explain Code")),
        (FourFingers, GestureBinding::command("/cost", "Show Cost")),
    ])
}

pub fn default_presets() -> BTreeMap<String, Vec<String>> {
    let preset = |name: &str, commands: &[&str]| {
        (
            name.to_string(),
            commands.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
        )
    };

    BTreeMap::from([
        preset(
            "claude_commands",
            &["/help", "/clear", "/compact", "/cost", "/doctor", "/status"],
        ),
        preset(
            "dev_commands",
            &[
                "start the dev server",
                "kill the running server",
                "run tests",
                "run the build",
                "check for errors",
            ],
        ),
        preset(
            "git_commands",
            &[
                "commit and push",
                "show git status",
                "create a pull request",
                "undo the last commit",
            ],
        ),
        preset(
            "code_commands",
            &[
                "explain this code",
                "find bugs in this code",
                "refactor this function",
                "add comments to this code",
            ],
        ),
    ])
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub type ChangeCallback = Box<dyn Fn(&Settings) + Send + Sync>;

struct StoreInner {
    path: Option<PathBuf>,
    settings: RwLock<Settings>,
    callbacks: Mutex<Vec<ChangeCallback>>,
}

/// Shared, runtime-editable settings. Cloning shares the same state.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

impl ConfigStore {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let settings = load_from_disk(&path)?;
        Ok(Self::build(Some(path), settings))
    }

    /// A store that is never written to disk. Settings are used as given.
    pub fn in_memory(settings: Settings) -> Self {
        Self::build(None, settings)
    }

    fn build(path: Option<PathBuf>, settings: Settings) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path,
                settings: RwLock::new(settings),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn snapshot(&self) -> Settings {
        self.inner.settings.read().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&Settings) -> R) -> R {
        f(&self.inner.settings.read())
    }

    pub fn binding(&self, gesture: GestureKind) -> Option<GestureBinding> {
        self.read(|s| s.binding(gesture).cloned())
    }

    pub fn description(&self, gesture: GestureKind) -> String {
        self.read(|s| s.description(gesture))
    }

    pub fn preset_commands(&self, preset: &str) -> Vec<String> {
        self.read(|s| s.command_presets.get(preset).cloned().unwrap_or_default())
    }

    /// Bind `gesture` to a typed command. Keeps the existing description
    /// unless a new one is given.
    pub fn set_command(&self, gesture: GestureKind, command: &str, description: Option<&str>) {
        self.update(|s| {
            let previous = s.gestures.remove(&gesture).and_then(|b| b.description);
            s.gestures.insert(
                gesture,
                GestureBinding {
                    effect: GestureEffect::Command(command.to_string()),
                    description: description.map(str::to_string).or(previous),
                },
            );
        });
        log::info!("gesture '{gesture}' now sends: {command}");
    }

    pub fn set_action(&self, gesture: GestureKind, action: ActionKind, description: Option<&str>) {
        self.update(|s| {
            let previous = s.gestures.remove(&gesture).and_then(|b| b.description);
            s.gestures.insert(
                gesture,
                GestureBinding {
                    effect: GestureEffect::Action(action),
                    description: description.map(str::to_string).or(previous),
                },
            );
        });
        log::info!("gesture '{gesture}' now performs: {}", action.as_str());
    }

    /// Returns false when the gesture has no binding to describe.
    pub fn set_description(&self, gesture: GestureKind, description: &str) -> bool {
        let mut found = false;
        self.update(|s| {
            if let Some(binding) = s.gestures.get_mut(&gesture) {
                binding.description = Some(description.to_string());
                found = true;
            }
        });
        found
    }

    pub fn reset_to_defaults(&self) {
        self.update(|s| *s = Settings::default());
        log::info!("configuration reset to defaults");
    }

    /// Register a callback run after every change.
    pub fn on_change(&self, callback: impl Fn(&Settings) + Send + Sync + 'static) {
        self.inner.callbacks.lock().push(Box::new(callback));
    }

    /// Write the current settings to the backing file. In-memory stores
    /// accept the call and do nothing.
    pub fn save(&self) -> Result<(), ConfigError> {
        let Some(path) = self.inner.path.as_deref() else {
            return Ok(());
        };
        let settings = self.inner.settings.read();
        save_to_disk(path, &settings)?;
        log::info!("config saved to {}", path.display());
        Ok(())
    }

    fn update(&self, edit: impl FnOnce(&mut Settings)) {
        let snapshot = {
            let mut settings = self.inner.settings.write();
            edit(&mut settings);
            settings.clone()
        };
        for callback in self.inner.callbacks.lock().iter() {
            callback(&snapshot);
        }
    }
}

fn load_from_disk(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        log::info!("config file {} not found, using defaults", path.display());
        return Ok(Settings::default());
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut settings: Settings =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if settings.version < CURRENT_VERSION {
        log::info!(
            "migrating config from version {} to {CURRENT_VERSION}",
            settings.version
        );
        settings.version = CURRENT_VERSION;
    }
    settings.fill_defaults();

    log::info!("loaded config from {}", path.display());
    Ok(settings)
}

fn save_to_disk(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let contents = serde_json::to_string_pretty(settings)?;
    fs::write(path, contents).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
