//! Output mixer - one render quantum
//!
//! The dry path is attenuated by a fixed [`DRY_OUTPUT_GAIN`] before the
//! reverb send adds its wet contribution on top.

use super::player::Player;
use super::pool::BufferPool;
use super::reverb_unit::ReverbUnit;
use super::session::PlaybackSession;
use crate::types::StereoSample;

/// Fixed gain applied to the dry signal
pub const DRY_OUTPUT_GAIN: f32 = 0.5;

/// Render one quantum into `dest`
///
/// `dest` is always zeroed first; nothing more happens while the session
/// is silent. Returns whether audio was produced. `dest` must not be
/// longer than the pool.
pub fn render_quantum(
    session: &PlaybackSession,
    player: &mut Player,
    reverb: &mut ReverbUnit,
    pool: &mut BufferPool,
    dest: &mut [StereoSample],
) -> bool {
    dest.fill(StereoSample::silence());

    if session.is_silent() {
        return false;
    }

    let views = pool.views(dest.len());
    views.player.fill(StereoSample::silence());
    if !player.render(views.player, DRY_OUTPUT_GAIN) {
        return false;
    }

    for (d, s) in dest.iter_mut().zip(views.player.iter()) {
        *d += *s;
    }

    // On error the wet is skipped and dest keeps the dry mix
    reverb
        .process(views.player, views.reverb_in, views.reverb_out, dest)
        .ok();

    true
}
