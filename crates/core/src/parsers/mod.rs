pub mod lastfm;

use thiserror::Error;
use tuneline_protocol::Scrobble;

use crate::fetch::FetchError;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("last.fm: {0}")]
    LastFm(#[from] lastfm::LastFmParseError),
    #[error("tuneline: {0}")]
    Native(#[from] serde_json::Error),
    #[error("unable to detect format")]
    UnknownFormat,
}

impl From<ParseError> for FetchError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::LastFm(inner) => inner.into(),
            other => FetchError::Server(other.to_string()),
        }
    }
}

/// A decoded listening history export.
#[derive(Debug, Clone, Default)]
pub struct History {
    /// Account the export belongs to, when the format records it.
    pub user: Option<String>,
    pub scrobbles: Vec<Scrobble>,
}

/// Detect the export format and decode it.
///
/// Detection strategy:
/// 1. A Last.fm response (`recenttracks` or an `error` object), or an array
///    of them.
/// 2. A plain array of serialized [`Scrobble`]s.
pub fn parse_auto(data: &[u8]) -> Result<History, ParseError> {
    let value: serde_json::Value =
        serde_json::from_slice(data).map_err(|_| ParseError::UnknownFormat)?;

    let looks_like_lastfm = |v: &serde_json::Value| {
        v.get("recenttracks").is_some() || (v.get("error").is_some() && v.get("message").is_some())
    };

    let is_lastfm = match &value {
        serde_json::Value::Array(items) => items.first().is_some_and(looks_like_lastfm),
        other => looks_like_lastfm(other),
    };
    if is_lastfm {
        let pages = lastfm::parse_recent_tracks_pages(data)?;
        let user = pages.iter().find_map(|p| p.user.clone());
        let scrobbles = pages.into_iter().flat_map(|p| p.scrobbles).collect();
        return Ok(History { user, scrobbles });
    }

    if let serde_json::Value::Array(items) = &value
        && items.first().is_none_or(|v| v.get("listened_at").is_some())
    {
        let scrobbles: Vec<Scrobble> = serde_json::from_value(value)?;
        return Ok(History {
            user: None,
            scrobbles,
        });
    }

    Err(ParseError::UnknownFormat)
}
