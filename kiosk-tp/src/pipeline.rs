//! Tag pipeline wiring: serial reader feeding the playback supervisor

use crate::error::Result;
use crate::playback::PlaybackSupervisor;
use crate::serial::{pump_scans, PortOpener};
use kiosk_common::config::PlaybackConfig;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

const SCAN_QUEUE_DEPTH: usize = 32;

/// Run reader and supervisor until `cancel` fires or the serial link is lost
///
/// Either way the supervisor stops its player and drains its reapers before
/// this returns. A lost link surfaces as [`crate::Error::Serial`].
pub async fn run_pipeline<O: PortOpener>(
    opener: O,
    supervisor: PlaybackSupervisor,
    config: &PlaybackConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let (scan_tx, scan_rx) = mpsc::channel(SCAN_QUEUE_DEPTH);
    info!(port = %opener.name(), baud_rate = config.baud_rate, "Waiting for tag scans");

    let reader = async {
        let result = pump_scans(
            opener,
            config.read_buffer_size,
            config.reconnect.clone(),
            scan_tx,
            cancel.clone(),
        )
        .await;
        // Reader is done for good; take the supervisor down with it
        cancel.cancel();
        result
    };

    let (reader_result, ()) = tokio::join!(reader, supervisor.run(scan_rx, cancel.clone()));
    reader_result?;
    Ok(())
}
