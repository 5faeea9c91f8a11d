//! Shared collaborators handed to both loops.
//!
//! Everything here is cheap to clone (`Arc` handles), so the binary builds
//! one [`MonitorContext`] and gives each loop its own copy.

use std::sync::Arc;

use crate::config::MonitorConfig;
use crate::diagnostics::CriticalFailureReporter;
use crate::shutdown::Shutdown;
use crate::store::SharedSeries;

use super::ports::{ChartRenderer, ChatTransport, Clock};

#[derive(Clone)]
pub struct MonitorContext {
    pub config: Arc<MonitorConfig>,
    pub series: SharedSeries,
    pub transport: Arc<dyn ChatTransport>,
    pub renderer: Arc<dyn ChartRenderer>,
    pub clock: Arc<dyn Clock>,
    pub reporter: Arc<CriticalFailureReporter>,
    pub shutdown: Shutdown,
}

impl MonitorContext {
    /// Wire the context; the failure reporter is built from the same
    /// transport and clock so escalations share their behaviour.
    pub fn new(
        config: MonitorConfig,
        series: SharedSeries,
        transport: Arc<dyn ChatTransport>,
        renderer: Arc<dyn ChartRenderer>,
        clock: Arc<dyn Clock>,
        shutdown: Shutdown,
    ) -> Self {
        let reporter = Arc::new(CriticalFailureReporter::new(
            transport.clone(),
            clock.clone(),
            config.error_channel_id,
            config.log_file.clone(),
            config.escalation_cooldown,
        ));
        Self {
            config: Arc::new(config),
            series,
            transport,
            renderer,
            clock,
            reporter,
            shutdown,
        }
    }
}
