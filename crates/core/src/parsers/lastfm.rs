//! Decoder for Last.fm `user.getRecentTracks` JSON responses.

use chrono::DateTime;
use serde::Deserialize;
use thiserror::Error;
use tuneline_protocol::{Scrobble, ScrobbleId, SharedStr};

use crate::fetch::FetchError;

/// Last.fm's code for "User not found" (and other invalid parameters).
const API_ERROR_INVALID_PARAMETERS: u32 = 6;

#[derive(Debug, Error)]
pub enum LastFmParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("last.fm error {code}: {message}")]
    Api { code: u32, message: String },
    #[error("invalid timestamp {0:?}")]
    Timestamp(String),
}

impl From<LastFmParseError> for FetchError {
    fn from(err: LastFmParseError) -> Self {
        match err {
            LastFmParseError::Api { code, message } if code == API_ERROR_INVALID_PARAMETERS => {
                FetchError::UnknownUser(message)
            }
            other => FetchError::Server(other.to_string()),
        }
    }
}

/// One decoded page of a recent-tracks response.
#[derive(Debug, Clone)]
pub struct RecentTracksPage {
    pub user: Option<String>,
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
    pub scrobbles: Vec<Scrobble>,
    /// Entries without a `date`, i.e. the track playing right now.
    pub now_playing: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    Tracks { recenttracks: RecentTracks },
    Error { error: u32, message: String },
}

#[derive(Debug, Deserialize)]
struct RecentTracks {
    #[serde(default)]
    track: OneOrMany<RawTrack>,
    #[serde(rename = "@attr", default)]
    attr: Option<PageAttr>,
}

/// Last.fm sends a bare object instead of a one-element array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(v) => v,
            Self::One(t) => vec![t],
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageAttr {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    page: Option<StrOrNum>,
    #[serde(rename = "totalPages", default)]
    total_pages: Option<StrOrNum>,
    #[serde(default)]
    total: Option<StrOrNum>,
}

/// Numbers arrive as strings ("1709280000") but tolerate real numbers too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StrOrNum {
    Str(String),
    Num(i64),
}

impl StrOrNum {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Str(s) => s.trim().parse().ok(),
            Self::Num(n) => Some(*n),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTrack {
    #[serde(default)]
    artist: Option<TextField>,
    #[serde(default)]
    album: Option<TextField>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    date: Option<RawDate>,
    #[serde(default)]
    image: Vec<RawImage>,
}

#[derive(Debug, Deserialize)]
struct TextField {
    #[serde(rename = "#text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawDate {
    uts: StrOrNum,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    #[serde(default)]
    size: String,
    #[serde(rename = "#text", default)]
    text: String,
}

/// Parse a single `user.getRecentTracks` response.
pub fn parse_recent_tracks(data: &[u8]) -> Result<RecentTracksPage, LastFmParseError> {
    let envelope: Envelope = serde_json::from_slice(data)?;
    decode_envelope(envelope)
}

/// Parse an export holding either one response or an array of page
/// responses.
pub fn parse_recent_tracks_pages(data: &[u8]) -> Result<Vec<RecentTracksPage>, LastFmParseError> {
    let value: serde_json::Value = serde_json::from_slice(data)?;
    match value {
        serde_json::Value::Array(pages) => pages
            .into_iter()
            .map(|page| decode_envelope(serde_json::from_value(page)?))
            .collect(),
        other => decode_envelope(serde_json::from_value(other)?).map(|page| vec![page]),
    }
}

fn decode_envelope(envelope: Envelope) -> Result<RecentTracksPage, LastFmParseError> {
    let recent = match envelope {
        Envelope::Tracks { recenttracks } => recenttracks,
        Envelope::Error { error, message } => {
            return Err(LastFmParseError::Api {
                code: error,
                message,
            });
        }
    };

    let attr = recent.attr;
    let number = |field: Option<&StrOrNum>, default: i64| {
        field.and_then(StrOrNum::as_i64).unwrap_or(default)
    };
    let page = number(attr.as_ref().and_then(|a| a.page.as_ref()), 1);
    let total_pages = number(attr.as_ref().and_then(|a| a.total_pages.as_ref()), 1);
    let total = number(attr.as_ref().and_then(|a| a.total.as_ref()), 0);

    let mut scrobbles = Vec::new();
    let mut now_playing = 0;
    for raw in recent.track.into_vec() {
        match decode_track(raw)? {
            Some(scrobble) => scrobbles.push(scrobble),
            None => now_playing += 1,
        }
    }

    Ok(RecentTracksPage {
        user: attr.and_then(|a| a.user),
        page: u32::try_from(page).unwrap_or(1),
        total_pages: u32::try_from(total_pages).unwrap_or(1),
        total: u64::try_from(total).unwrap_or(0),
        scrobbles,
        now_playing,
    })
}

/// `None` for the now-playing entry, which has no timestamp yet.
fn decode_track(raw: RawTrack) -> Result<Option<Scrobble>, LastFmParseError> {
    let Some(date) = raw.date else {
        return Ok(None);
    };
    let uts = date
        .uts
        .as_i64()
        .ok_or_else(|| LastFmParseError::Timestamp(format!("{:?}", date.uts)))?;
    let listened_at =
        DateTime::from_timestamp(uts, 0).ok_or_else(|| LastFmParseError::Timestamp(uts.to_string()))?;

    let artist = raw
        .artist
        .map(|a| a.text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Unknown Artist".to_string());
    let track = raw
        .name
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Unknown Track".to_string());
    let album = raw
        .album
        .map(|a| a.text)
        .filter(|t| !t.is_empty())
        .map(SharedStr::from);
    let artwork = raw
        .image
        .into_iter()
        .find(|img| img.size == "extralarge" && !img.text.is_empty())
        .map(|img| SharedStr::from(img.text));

    Ok(Some(Scrobble {
        id: natural_id(uts, &artist, &track),
        artist: artist.into(),
        track: track.into(),
        album,
        listened_at,
        artwork,
    }))
}

/// Identity from `(timestamp, artist, track)`: two copies of the same listen
/// share an id and collapse during normalization.
pub fn natural_id(uts: i64, artist: &str, track: &str) -> ScrobbleId {
    ScrobbleId::new(format!("{uts}:{artist}:{track}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"{
      "recenttracks": {
        "track": [
          {
            "artist": {"mbid": "", "#text": "Noname"},
            "name": "Diddy Bop",
            "album": {"mbid": "", "#text": "Telefone"},
            "image": [
              {"size": "small", "#text": "https://img/s.jpg"},
              {"size": "extralarge", "#text": "https://img/xl.jpg"}
            ],
            "@attr": {"nowplaying": "true"}
          },
          {
            "artist": {"mbid": "", "#text": "Noname"},
            "name": "All I Need (feat. Xavier Omär)",
            "album": {"mbid": "", "#text": ""},
            "image": [],
            "date": {"uts": "1486222510", "#text": "04 Feb 2017, 15:35"}
          }
        ],
        "@attr": {"user": "rj", "page": "1", "perPage": "200", "totalPages": "3", "total": "401"}
      }
    }"##;

    #[test]
    fn parses_page_and_skips_now_playing() {
        let page = parse_recent_tracks(PAGE.as_bytes());
        assert!(page.is_ok(), "parse failed: {page:?}");
        let Ok(page) = page else { return };
        assert_eq!(page.user.as_deref(), Some("rj"));
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total, 401);
        assert_eq!(page.now_playing, 1);
        assert_eq!(page.scrobbles.len(), 1);

        let s = &page.scrobbles[0];
        assert_eq!(s.artist, "Noname");
        assert_eq!(s.track, "All I Need (feat. Xavier Om\u{e4}r)");
        assert!(s.album.is_none());
        assert_eq!(s.listened_at.timestamp(), 1_486_222_510);
        assert_eq!(s.id.as_str(), "1486222510:Noname:All I Need (feat. Xavier Om\u{e4}r)");
    }

    #[test]
    fn single_track_object_is_accepted() {
        let data = r##"{"recenttracks": {"track": {
            "artist": {"#text": "Sampa the Great"},
            "name": "Final Form",
            "album": {"#text": "As Above, So Below"},
            "image": [{"size": "extralarge", "#text": "https://img/ff.jpg"}],
            "date": {"uts": "1700000000"}
        }}}"##;
        let page = parse_recent_tracks(data.as_bytes());
        let scrobbles = page.map(|p| p.scrobbles).unwrap_or_default();
        assert_eq!(scrobbles.len(), 1);
        assert_eq!(
            scrobbles[0].artwork.as_deref(),
            Some("https://img/ff.jpg")
        );
        assert_eq!(scrobbles[0].album.as_deref(), Some("As Above, So Below"));
    }

    #[test]
    fn missing_names_get_placeholders() {
        let data = r#"{"recenttracks": {"track": [{"date": {"uts": 1700000000}}]}}"#;
        let scrobbles = parse_recent_tracks(data.as_bytes())
            .map(|p| p.scrobbles)
            .unwrap_or_default();
        assert_eq!(scrobbles[0].artist, "Unknown Artist");
        assert_eq!(scrobbles[0].track, "Unknown Track");
    }

    #[test]
    fn api_error_maps_to_unknown_user() {
        let data = r#"{"error": 6, "message": "User not found"}"#;
        let err = parse_recent_tracks(data.as_bytes()).err();
        assert!(matches!(err, Some(LastFmParseError::Api { code: 6, .. })));
        let fetch_err = err.map(FetchError::from);
        assert_eq!(
            fetch_err,
            Some(FetchError::UnknownUser("User not found".into()))
        );
    }

    #[test]
    fn other_api_errors_are_server_errors() {
        let data = r#"{"error": 29, "message": "Rate limit exceeded"}"#;
        let err = parse_recent_tracks(data.as_bytes()).map_err(FetchError::from);
        assert!(matches!(err, Err(FetchError::Server(_))));
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let data = r#"{"recenttracks": {"track": [{"name": "x", "date": {"uts": "soon"}}]}}"#;
        assert!(matches!(
            parse_recent_tracks(data.as_bytes()),
            Err(LastFmParseError::Timestamp(_))
        ));
    }

    #[test]
    fn page_arrays_decode_in_order() {
        let data = format!("[{PAGE}, {PAGE}]");
        let pages = parse_recent_tracks_pages(data.as_bytes()).unwrap_or_default();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].scrobbles.len(), 1);
    }
}
