//! One utterance end to end: synthesize, sequence, schedule, play, reset.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audio::{self, AudioOutput, DecodedAudio, TimedOutput};
use crate::config::LipSyncConfig;
use crate::error::{LipSyncError, Result};
use crate::playback::{PlaybackScheduler, VisemeSink};
use crate::runtime::LipSyncEvent;
use crate::synthesis::{
    AlignedSynthesizer, CharacterAlignment, ElevenLabsClient, ElevenLabsSettings, Sequencing,
    SpeechProvider, VendorEventSynthesizer,
};
use crate::viseme::vendor::LEAD_CORRECTION_MS;
use crate::viseme::{LocalSequencer, RemoteSequencer, VendorVisemeStream, VisemeSequence};

/// Default capacity of the event broadcast channel.
const EVENT_CHANNEL_SIZE: usize = 64;

/// Where alignment-path sequences are computed.
#[derive(Debug, Clone)]
pub enum AlignmentSequencer {
    Local(LocalSequencer),
    Remote {
        client: RemoteSequencer,
        version: u32,
    },
}

impl AlignmentSequencer {
    /// Sequence `text` against the provider's alignment.
    ///
    /// # Errors
    ///
    /// Only the remote variant fails (see
    /// [`RemoteSequencer::sequence_remote`]).
    pub async fn sequence(
        &self,
        text: &str,
        alignment: &CharacterAlignment,
    ) -> Result<VisemeSequence> {
        match self {
            Self::Local(local) => Ok(local.sequence_with_end_times(
                text,
                &alignment.start_seconds,
                &alignment.end_seconds,
            )),
            Self::Remote { client, version } => {
                client
                    .sequence_remote(
                        text,
                        &alignment.start_seconds,
                        &alignment.end_seconds,
                        *version,
                    )
                    .await
            }
        }
    }
}

enum Provider {
    Aligned {
        synthesizer: Arc<dyn AlignedSynthesizer>,
        sequencer: AlignmentSequencer,
    },
    Vendor {
        synthesizer: Arc<dyn VendorEventSynthesizer>,
        lead_ms: u64,
    },
}

/// Result of a spoken utterance.
#[derive(Debug, Clone)]
pub struct SpeakOutcome {
    pub utterance_id: Uuid,
    pub sequence: VisemeSequence,
    /// False if a newer utterance (or shutdown) cut this one short.
    pub completed: bool,
}

/// Drives a character's mouth from synthesized speech.
pub struct LipSyncPipeline {
    provider: Provider,
    scheduler: PlaybackScheduler,
    output: Arc<dyn AudioOutput>,
    events: broadcast::Sender<LipSyncEvent>,
}

impl std::fmt::Debug for LipSyncPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let provider = match &self.provider {
            Provider::Aligned { synthesizer, .. } => synthesizer.name().to_owned(),
            Provider::Vendor { synthesizer, .. } => synthesizer.name().to_owned(),
        };
        f.debug_struct("LipSyncPipeline")
            .field("provider", &provider)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl LipSyncPipeline {
    fn with_provider(provider: Provider, sink: Arc<dyn VisemeSink>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            provider,
            scheduler: PlaybackScheduler::new(sink).with_events(events.clone()),
            output: Arc::new(TimedOutput),
            events,
        }
    }

    /// Pipeline over an aligned provider (alignment path).
    pub fn aligned(
        synthesizer: Arc<dyn AlignedSynthesizer>,
        sequencer: AlignmentSequencer,
        sink: Arc<dyn VisemeSink>,
    ) -> Self {
        Self::with_provider(
            Provider::Aligned {
                synthesizer,
                sequencer,
            },
            sink,
        )
    }

    /// Pipeline over a vendor-event provider (vendor path).
    pub fn vendor(synthesizer: Arc<dyn VendorEventSynthesizer>, sink: Arc<dyn VisemeSink>) -> Self {
        Self::with_provider(
            Provider::Vendor {
                synthesizer,
                lead_ms: LEAD_CORRECTION_MS,
            },
            sink,
        )
    }

    /// Vendor-event pipeline for `synthesizer`, with the lead correction,
    /// event capacity and audio output taken from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::Config`] for an invalid config or one whose
    /// provider is not `vendor_events`.
    pub fn vendor_from_config(
        config: &LipSyncConfig,
        synthesizer: Arc<dyn VendorEventSynthesizer>,
        sink: Arc<dyn VisemeSink>,
    ) -> Result<Self> {
        config.validate()?;
        let SpeechProvider::VendorEvents { voice } = &config.synthesis.provider else {
            return Err(LipSyncError::Config(
                "ElevenLabs providers are constructed with LipSyncPipeline::from_config".to_owned(),
            ));
        };
        info!(
            provider = synthesizer.name(),
            %voice,
            lead_ms = config.vendor.lead_ms,
            "vendor-event pipeline configured"
        );
        let (events, _) = broadcast::channel(config.playback.event_capacity);
        Ok(Self {
            provider: Provider::Vendor {
                synthesizer,
                lead_ms: config.vendor.lead_ms,
            },
            scheduler: PlaybackScheduler::new(sink).with_events(events.clone()),
            output: audio::output_for(&config.playback)?,
            events,
        })
    }

    /// Build the ElevenLabs pipeline described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::Config`] for an invalid config, a vendor-event
    /// provider (see [`vendor_from_config`](Self::vendor_from_config)), or a
    /// missing API key; [`LipSyncError::Lexicon`] if the configured
    /// dictionary cannot be loaded.
    pub fn from_config(config: &LipSyncConfig, sink: Arc<dyn VisemeSink>) -> Result<Self> {
        config.validate()?;
        let SpeechProvider::ElevenLabs { sequencing, .. } = &config.synthesis.provider else {
            return Err(LipSyncError::Config(
                "vendor-event providers are constructed with LipSyncPipeline::vendor_from_config"
                    .to_owned(),
            ));
        };
        let synthesizer = ElevenLabsClient::new(ElevenLabsSettings::from_config(&config.synthesis)?)?;
        let sequencer = match sequencing {
            Sequencing::Local => {
                AlignmentSequencer::Local(LocalSequencer::from_config(&config.dictionary)?)
            }
            Sequencing::Remote { version } => AlignmentSequencer::Remote {
                client: RemoteSequencer::from_config(&config.remote)?,
                version: *version,
            },
        };
        let (events, _) = broadcast::channel(config.playback.event_capacity);
        Ok(Self {
            provider: Provider::Aligned {
                synthesizer: Arc::new(synthesizer),
                sequencer,
            },
            scheduler: PlaybackScheduler::new(sink).with_events(events.clone()),
            output: audio::output_for(&config.playback)?,
            events,
        })
    }

    /// Replace the audio output (default: [`TimedOutput`]).
    pub fn with_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.output = output;
        self
    }

    /// Override the vendor lead correction. No effect on aligned providers.
    pub fn with_lead_ms(mut self, lead: u64) -> Self {
        if let Provider::Vendor { lead_ms, .. } = &mut self.provider {
            *lead_ms = lead;
        }
        self
    }

    /// Subscribe to runtime events.
    pub fn subscribe(&self) -> broadcast::Receiver<LipSyncEvent> {
        self.events.subscribe()
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    /// Stop any utterance in flight and close the mouth.
    pub fn interrupt(&self) {
        self.scheduler.interrupt();
    }

    /// Cancel all timers permanently.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    fn emit(&self, event: LipSyncEvent) {
        let _ = self.events.send(event);
    }

    /// Speak `text`, animating the mouth in sync with the audio.
    ///
    /// Resolves when playback ends (or the utterance is superseded by a
    /// newer call). The mouth is reset to neutral at the end.
    ///
    /// # Errors
    ///
    /// - [`LipSyncError::InvalidInput`] for blank text.
    /// - Synthesis, sequencing or audio errors; playback is aborted and the
    ///   error is also broadcast as [`LipSyncEvent::UtteranceFailed`].
    pub async fn speak(&self, text: &str) -> Result<SpeakOutcome> {
        if text.trim().is_empty() {
            return Err(LipSyncError::InvalidInput("text is empty".to_owned()));
        }
        let utterance_id = Uuid::new_v4();
        info!(%utterance_id, chars = text.chars().count(), "utterance started");
        self.emit(LipSyncEvent::UtteranceStarted {
            utterance_id,
            text: text.to_owned(),
        });

        match self.run(utterance_id, text).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(%utterance_id, code = e.code(), "utterance failed: {e}");
                self.emit(LipSyncEvent::UtteranceFailed {
                    utterance_id,
                    code: e.code(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run(&self, utterance_id: Uuid, text: &str) -> Result<SpeakOutcome> {
        let (audio, sequence) = self.prepare(text).await?;
        self.emit(LipSyncEvent::SequenceReady {
            utterance_id,
            visemes: sequence.len(),
            end_ms: sequence.end_ms(),
            audio_ms: u64::try_from(audio.duration().as_millis()).unwrap_or(u64::MAX),
        });
        if sequence.is_empty() {
            warn!(%utterance_id, "no recognised words; mouth stays neutral");
        }

        let handle = self.scheduler.schedule_with_id(utterance_id, &sequence);
        let played = self.output.play(&audio, handle.cancellation()).await;
        let superseded = handle.is_cancelled();
        self.scheduler.finish(&handle);
        played?;

        let completed = !superseded;
        info!(%utterance_id, completed, "utterance finished");
        self.emit(LipSyncEvent::UtteranceFinished {
            utterance_id,
            completed,
        });
        Ok(SpeakOutcome {
            utterance_id,
            sequence,
            completed,
        })
    }

    async fn prepare(&self, text: &str) -> Result<(DecodedAudio, VisemeSequence)> {
        match &self.provider {
            Provider::Aligned {
                synthesizer,
                sequencer,
            } => {
                let speech = synthesizer.synthesize(text).await?;
                let sequence = sequencer.sequence(text, &speech.alignment).await?;
                let audio = audio::decode_audio(speech.audio)?;
                Ok((audio, sequence))
            }
            Provider::Vendor {
                synthesizer,
                lead_ms,
            } => {
                let speech = synthesizer.synthesize(text).await?;
                let sequence = VendorVisemeStream::new(speech.events)
                    .with_lead_ms(*lead_ms)
                    .collect_sequence()?;
                let audio = audio::decode_audio(speech.audio)?;
                Ok((audio, sequence))
            }
        }
    }
}
