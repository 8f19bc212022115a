//! MidiBindEngine builder.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use crossbeam_channel::bounded;
use midibind_core::{ActionError, ActionInvoker};
use parking_lot::Mutex;

use super::config::EngineConfig;
use super::status::{EngineStatus, ReportSender, StatsCounters};
use super::{EngineInner, MidiBindEngine};
use crate::error::{Error, Result};
use crate::port::{PortProvider, VirtualPortProvider};

#[derive(Default)]
pub struct EngineBuilder {
    provider: Option<Arc<dyn PortProvider>>,
    invoker: Option<Arc<dyn ActionInvoker>>,
    config: EngineConfig,
    #[cfg(feature = "midi-io")]
    enable_io: bool,
}

impl EngineBuilder {
    /// Hardware inputs through midir. Ignored if a provider is set explicitly.
    #[cfg(feature = "midi-io")]
    pub fn midi_io(mut self) -> Self {
        self.enable_io = true;
        self
    }

    pub fn port_provider(mut self, provider: impl PortProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    pub fn shared_port_provider(mut self, provider: Arc<dyn PortProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// In-process ports. Keep a clone of `ports` to feed them.
    pub fn virtual_ports(self, ports: VirtualPortProvider) -> Self {
        self.port_provider(ports)
    }

    pub fn invoker(mut self, invoker: impl ActionInvoker + 'static) -> Self {
        self.invoker = Some(Arc::new(invoker));
        self
    }

    pub fn shared_invoker(mut self, invoker: Arc<dyn ActionInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Closure form of [`invoker`](Self::invoker).
    pub fn on_action<F>(self, f: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<(), ActionError> + Send + Sync + 'static,
    {
        self.invoker(f)
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = name.into();
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.config.open_timeout = timeout;
        self
    }

    pub fn port_check_interval(mut self, interval: Duration) -> Self {
        self.config.port_check_interval = interval;
        self
    }

    pub fn report_capacity(mut self, capacity: usize) -> Self {
        self.config.report_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<MidiBindEngine> {
        self.config.validate()?;

        let provider = match self.provider {
            Some(provider) => provider,
            #[cfg(feature = "midi-io")]
            None if self.enable_io => Arc::new(crate::io::MidirPortProvider::new(
                self.config.client_name.clone(),
            )),
            None => {
                return Err(Error::InvalidConfig(
                    "no MIDI port provider configured".to_string(),
                ))
            }
        };

        let invoker = self
            .invoker
            .ok_or_else(|| Error::InvalidConfig("no action invoker configured".to_string()))?;

        let (report_tx, report_rx) = bounded(self.config.report_capacity);

        Ok(MidiBindEngine {
            inner: Arc::new(EngineInner {
                provider,
                invoker,
                config: self.config,
                session: Mutex::new(None),
                status: Arc::new(ArcSwap::from_pointee(EngineStatus::Idle)),
                connected_port: ArcSwap::from_pointee(None),
                stats: ArcSwap::from_pointee(StatsCounters::default()),
                report_tx: ReportSender::new(report_tx),
                report_rx,
            }),
        })
    }
}
