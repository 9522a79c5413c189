use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backend::Registrar;
use crate::error::{ApiError, ApiResult};

/// Obtains a credential from a bridge through the link-button handshake.
///
/// Pairing never persists anything; the caller decides what to do with the
/// credential.
pub struct PairingEngine {
    registrar: Arc<dyn Registrar>,
    devicetype: String,
}

impl PairingEngine {
    pub fn new(registrar: Arc<dyn Registrar>, devicetype: impl Into<String>) -> Self {
        Self {
            registrar,
            devicetype: devicetype.into(),
        }
    }

    /// Single pairing attempt.
    ///
    /// Fails with a link-button error until the button on the bridge has
    /// been pressed.
    pub async fn pair(&self, address: &str) -> ApiResult<String> {
        let reply = self.registrar.register(address, &self.devicetype).await?;

        let Some(first) = reply.into_iter().next() else {
            return Err(ApiError::NoData);
        };

        let user = first.into_result()?;
        log::info!("Paired with bridge at {address}");
        Ok(user.username)
    }

    /// Keep attempting to pair while the link button has not been pressed.
    ///
    /// Any other failure ends the loop immediately.
    pub async fn pair_until_linked(
        &self,
        address: &str,
        interval: Duration,
        attempts: u32,
        cancel: &CancellationToken,
    ) -> ApiResult<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let res = tokio::select! {
                () = cancel.cancelled() => return Err(ApiError::Cancelled),
                res = self.pair(address) => res,
            };

            match res {
                Err(err) if err.is_link_button() && attempt < attempts => {
                    log::info!(
                        "{} (attempt {attempt}/{attempts})",
                        err.pairing_message()
                    );
                }
                res => return res,
            }

            tokio::select! {
                () = cancel.cancelled() => return Err(ApiError::Cancelled),
                () = tokio::time::sleep(interval) => {}
            }
        }
    }
}
