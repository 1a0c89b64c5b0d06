use reqwest::Url;
use tracing::{info, warn};

use super::ui::{Announcer, Ui};
use crate::agent::worker::PLAY_PARAM;

/// Clip reference carried by a page URL, if any.
pub fn clip_from_page_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, value)| key == PLAY_PARAM && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Page-load handling of the autoplay parameter. Playback may be refused by
/// the platform, so the manual play control is shown either way.
pub fn on_page_load(url: &Url, announcer: &dyn Announcer, ui: &dyn Ui) -> Option<String> {
    let clip = clip_from_page_url(url)?;
    info!("page opened to play {clip}");
    if let Err(e) = announcer.play_clip(&clip) {
        warn!("Autoplay prevented: {e}");
    }
    ui.show_play_control(&clip);
    Some(clip)
}
