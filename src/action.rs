use crate::{
    config::{ActionKind, ConfigStore, GestureEffect, Settings},
    dictation::{Transcriber, clean_transcription},
    error::ActionError,
    types::GestureKind,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
}

/// OS keystroke injection.
pub trait KeyInjector {
    fn type_text(&mut self, text: &str) -> Result<(), ActionError>;
    fn press(&mut self, key: Key) -> Result<(), ActionError>;
}

/// Logs keystrokes instead of sending them. Used for `--dry-run` and when
/// the binary is built without keystroke support.
#[derive(Debug, Default)]
pub struct LogInjector;

impl KeyInjector for LogInjector {
    fn type_text(&mut self, text: &str) -> Result<(), ActionError> {
        log::info!("[dry-run] type {text:?}");
        Ok(())
    }

    fn press(&mut self, key: Key) -> Result<(), ActionError> {
        log::info!("[dry-run] press {key:?}");
        Ok(())
    }
}

#[cfg(feature = "enigo")]
pub use self::enigo_injector::EnigoInjector;

#[cfg(feature = "enigo")]
mod enigo_injector {
    use enigo::{Direction, Enigo, Keyboard, Settings};

    use super::{Key, KeyInjector};
    use crate::error::ActionError;

    pub struct EnigoInjector {
        enigo: Enigo,
    }

    impl EnigoInjector {
        pub fn new() -> Result<Self, ActionError> {
            let enigo = Enigo::new(&Settings::default())
                .map_err(|e| ActionError::Injection(format!("failed to initialise enigo: {e}")))?;
            Ok(Self { enigo })
        }
    }

    impl KeyInjector for EnigoInjector {
        fn type_text(&mut self, text: &str) -> Result<(), ActionError> {
            self.enigo
                .text(text)
                .map_err(|e| ActionError::Injection(e.to_string()))
        }

        fn press(&mut self, key: Key) -> Result<(), ActionError> {
            let key = match key {
                Key::Enter => enigo::Key::Return,
                Key::Escape => enigo::Key::Escape,
            };
            self.enigo
                .key(key, Direction::Click)
                .map_err(|e| ActionError::Injection(e.to_string()))
        }
    }
}

/// Result of running a gesture's binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dispatch {
    pub description: String,
    pub success: bool,
}

/// Runs the effect bound to a triggered gesture. Bindings are read from the
/// shared config on every call, so runtime edits apply immediately.
pub struct ActionDispatcher {
    config: ConfigStore,
    injector: Box<dyn KeyInjector>,
    transcriber: Option<Box<dyn Transcriber>>,
    dictation_active: bool,
}

impl ActionDispatcher {
    pub fn new(config: ConfigStore, injector: Box<dyn KeyInjector>) -> Self {
        Self {
            config,
            injector,
            transcriber: None,
            dictation_active: false,
        }
    }

    pub fn with_transcriber(mut self, transcriber: Box<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// `None` when the gesture has no binding.
    pub fn dispatch(&mut self, gesture: GestureKind) -> Option<Dispatch> {
        let binding = self.config.binding(gesture)?;
        let description = self.config.description(gesture);

        let result = match &binding.effect {
            GestureEffect::Command(command) => self.send_command(command),
            GestureEffect::Action(ActionKind::ClearInput) => self.clear_input(),
            GestureEffect::Action(ActionKind::VoiceDictation) => self.toggle_dictation(),
        };

        match result {
            Ok(()) => Some(Dispatch {
                description,
                success: true,
            }),
            Err(err) => {
                log::error!("{gesture} action failed: {err}");
                Some(Dispatch {
                    description: format!("{description} (FAILED)"),
                    success: false,
                })
            }
        }
    }

    pub fn is_voice_gesture(&self, gesture: Option<GestureKind>) -> bool {
        gesture.is_some() && gesture == self.config.read(Settings::voice_gesture)
    }

    pub fn is_dictation_active(&self) -> bool {
        self.dictation_active
    }

    pub fn start_dictation(&mut self) -> Result<(), ActionError> {
        if self.dictation_active {
            return Ok(());
        }
        let transcriber = self.transcriber.as_mut().ok_or(ActionError::NoTranscriber)?;
        transcriber.start()?;
        self.dictation_active = true;
        log::info!("dictation started");
        Ok(())
    }

    pub fn stop_dictation(&mut self) -> Result<(), ActionError> {
        if !self.dictation_active {
            return Ok(());
        }
        self.dictation_active = false;
        if let Some(transcriber) = self.transcriber.as_mut() {
            transcriber.stop()?;
        }
        log::info!("dictation stopped");
        Ok(())
    }

    /// Type every finished transcript chunk. Returns how many were typed.
    pub fn drain_transcripts(&mut self) -> usize {
        let Some(transcriber) = self.transcriber.as_ref() else {
            return 0;
        };
        let chunks: Vec<String> = transcriber.transcripts().try_iter().collect();

        let mut typed = 0;
        for chunk in chunks {
            let text = clean_transcription(&chunk);
            if text.is_empty() {
                continue;
            }
            match self.injector.type_text(&format!("{text} ")) {
                Ok(()) => typed += 1,
                Err(err) => log::error!("failed to type transcript: {err}"),
            }
        }
        typed
    }

    fn send_command(&mut self, command: &str) -> Result<(), ActionError> {
        log::info!("sending command: {command}");
        self.injector.type_text(command)?;
        self.injector.press(Key::Enter)
    }

    fn clear_input(&mut self) -> Result<(), ActionError> {
        log::info!("clearing input");
        self.injector.press(Key::Escape)?;
        self.injector.press(Key::Escape)
    }

    fn toggle_dictation(&mut self) -> Result<(), ActionError> {
        if self.dictation_active {
            self.stop_dictation()
        } else {
            self.start_dictation()
        }
    }
}
