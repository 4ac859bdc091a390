//! ClockSyncBuilder -- fluent builder for [`ClockSync`] runs.
//!
//! Separates configuration from construction. [`build`](ClockSyncBuilder::build)
//! validates the options, checks that the rig is online, fills in the model
//! and CI-V address the user left out from what the rig channel reports, and
//! subscribes to reply events before anything is transmitted.
//!
//! # Example
//!
//! ```no_run
//! use civclock_core::SystemClock;
//! use civclock_icom::builder::ClockSyncBuilder;
//! use civclock_test_harness::MockRig;
//!
//! # async fn example() -> civclock_core::Result<()> {
//! let mut sync = ClockSyncBuilder::new()
//!     .model("IC-7300")
//!     .reversed_time_zone(true)
//!     .build(MockRig::new("IC-7300"), SystemClock)
//!     .await?;
//! let report = sync.run().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use civclock_core::error::{Error, Result};
use civclock_core::{Clock, RigChannel, RigStatus};
use tracing::{debug, info};

use crate::civ::{expected_acknowledgement, is_hex_byte};
use crate::clock::ClockAligner;
use crate::models::{
    lookup_model, lookup_model_for_rig_type, lookup_transceiver_address, IcomModel,
};
use crate::sync::ClockSync;
use crate::tracker::{PendingCommandTracker, RESPONSE_TIMEOUT};

/// Default CI-V address of the controlling computer.
pub const DEFAULT_CONTROLLER_ADDRESS: &str = "E0";

/// Fluent builder for [`ClockSync`].
#[derive(Debug, Clone)]
pub struct ClockSyncBuilder {
    model: Option<String>,
    transceiver_address: Option<String>,
    controller_address: String,
    rig: u8,
    reversed_time_zone: bool,
    quiet: bool,
    force_model: bool,
    response_timeout: Duration,
}

impl ClockSyncBuilder {
    /// Rig 1, controller `E0`, model and address taken from the rig.
    pub fn new() -> Self {
        ClockSyncBuilder {
            model: None,
            transceiver_address: None,
            controller_address: DEFAULT_CONTROLLER_ADDRESS.to_string(),
            rig: 1,
            reversed_time_zone: false,
            quiet: false,
            force_model: false,
            response_timeout: RESPONSE_TIMEOUT,
        }
    }

    /// Transceiver model, e.g. `"IC-7300"`.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override the model's default CI-V address (two hex digits).
    pub fn transceiver_address(mut self, address: impl Into<String>) -> Self {
        self.transceiver_address = Some(address.into());
        self
    }

    /// Override the controller's CI-V address (two hex digits).
    pub fn controller_address(mut self, address: impl Into<String>) -> Self {
        self.controller_address = address.into();
        self
    }

    /// Rig slot on the channel, 1-based.
    pub fn rig(mut self, rig: u8) -> Self {
        self.rig = rig;
        self
    }

    /// Keep the rig's clock on UTC and its "UTC" display on local time.
    pub fn reversed_time_zone(mut self, reversed: bool) -> Self {
        self.reversed_time_zone = reversed;
        self
    }

    /// Suppress informational logging.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Use the configured model even if the rig reports a different one.
    pub fn force_model(mut self, force: bool) -> Self {
        self.force_model = force;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Validate the configuration against `channel` and prepare a run.
    ///
    /// Nothing is transmitted. Fails with [`Error::Configuration`] for bad
    /// options or a model mismatch and [`Error::RigStatus`] when the rig is
    /// not online.
    pub async fn build<C, K>(self, channel: C, clock: K) -> Result<ClockSync<C, K>>
    where
        C: RigChannel,
        K: Clock,
    {
        let controller = normalize_address("controller", &self.controller_address)?;
        let transceiver = self
            .transceiver_address
            .as_deref()
            .map(|a| normalize_address("transceiver", a))
            .transpose()?;
        let configured = self.model.as_deref().map(lookup_model).transpose()?;

        let rig_count = channel.rig_count();
        if self.rig == 0 || self.rig > rig_count {
            return Err(Error::Configuration(format!(
                "rig number {} out of range (1-{rig_count})",
                self.rig
            )));
        }

        let status = channel.status(self.rig).await?;
        if status != RigStatus::Online {
            return Err(Error::RigStatus(status));
        }

        let rig_type = channel
            .rig_info(self.rig)
            .await?
            .map(|info| info.rig_type)
            .unwrap_or_default();
        debug!(rig = self.rig, rig_type = %rig_type, "rig reported");

        let model = self.resolve_model(configured, &rig_type)?;
        let transceiver = match transceiver {
            Some(address) => address,
            None => lookup_transceiver_address(model.name)?.to_ascii_uppercase(),
        };

        if !self.quiet {
            info!(
                rig = self.rig,
                model = model.name,
                transceiver = %transceiver,
                controller = %controller,
                reversed_time_zone = self.reversed_time_zone,
                "clock sync configured"
            );
        }

        let tracker = PendingCommandTracker::new(
            self.rig,
            expected_acknowledgement(&controller, &transceiver),
            channel.subscribe(),
        )
        .response_timeout(self.response_timeout);
        let aligner = ClockAligner::new(clock, self.reversed_time_zone).quiet(self.quiet);

        Ok(ClockSync::new(
            channel,
            aligner,
            tracker,
            model,
            transceiver,
            controller,
        ))
    }

    fn resolve_model(
        &self,
        configured: Option<&'static IcomModel>,
        rig_type: &str,
    ) -> Result<&'static IcomModel> {
        let Some(model) = configured else {
            let name = lookup_model_for_rig_type(rig_type)?;
            return lookup_model(name);
        };
        if self.force_model {
            return Ok(model);
        }
        match lookup_model_for_rig_type(rig_type) {
            Ok(reported) if reported == model.name => Ok(model),
            _ => Err(Error::Configuration(format!(
                "transceiver model {} does not match rig type '{rig_type}' (use force model to override)",
                model.name
            ))),
        }
    }
}

impl Default for ClockSyncBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_address(role: &str, address: &str) -> Result<String> {
    if !is_hex_byte(address) {
        return Err(Error::Configuration(format!(
            "{role} address '{address}' is not a two-digit hex value"
        )));
    }
    Ok(address.to_ascii_uppercase())
}
