use anyhow::Result;
use std::time::Duration;

use victimplay_core::{Controller, GameSource, VictimPublisher};

/// Run the curriculum until the final victim is beaten, sleeping `interval`
/// between polls. This is the only place the controller waits.
pub fn run_until_finished<S, P, F>(
    controller: &mut Controller<S, P>,
    interval: Duration,
    mut sleep: F,
) -> Result<()>
where
    S: GameSource,
    P: VictimPublisher,
    F: FnMut(Duration),
{
    controller.start()?;
    log::info!("Starting curriculum loop");
    loop {
        if let Some(active) = controller.curriculum().active() {
            log::info!("Curriculum is alive, current victim: {active}");
        }
        controller.step()?;
        if controller.is_finished() {
            break;
        }
        sleep(interval);
    }
    log::info!("Curriculum is done. Stopping");
    Ok(())
}
