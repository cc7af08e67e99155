//! Document viewport: a position inside a paginated document.
//!
//! The string form is `PAGE[;C1:x:y|;C2:x:y][;AF1:T|F:T|F]`, where `C1` anchors the
//! sub-position at the center of the view and `C2` at its top-left corner.

use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

/// Where the sub-position is anchored inside the visible area
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    Center,
    TopLeft,
}

impl Anchor {
    fn token(self) -> &'static str {
        match self {
            Anchor::Center => "C1",
            Anchor::TopLeft => "C2",
        }
    }
}

/// Normalized position inside a page (0.0..=1.0 on both axes)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubPosition {
    pub normalized_x: f64,
    pub normalized_y: f64,
    pub anchor: Anchor,
}

impl SubPosition {
    #[must_use]
    pub const fn top_left(normalized_x: f64, normalized_y: f64) -> Self {
        Self {
            normalized_x,
            normalized_y,
            anchor: Anchor::TopLeft,
        }
    }

    #[must_use]
    pub const fn center(normalized_x: f64, normalized_y: f64) -> Self {
        Self {
            normalized_x,
            normalized_y,
            anchor: Anchor::Center,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoFit {
    pub width: bool,
    pub height: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewportParseError {
    #[error("empty viewport string")]
    Empty,

    #[error("invalid page number {0:?}")]
    InvalidPage(String),

    #[error("malformed token {0:?}")]
    MalformedToken(String),
}

/// A position in a document: page index plus optional in-page anchor.
///
/// Two viewports are equal when page number and sub-position match; the
/// auto-fit flags are carried along but do not take part in comparison.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Viewport {
    /// 0-based page index, `-1` when unset
    pub page_number: i32,
    pub re_pos: Option<SubPosition>,
    pub auto_fit: Option<AutoFit>,
}

impl Viewport {
    pub const UNSET_PAGE: i32 = -1;

    #[must_use]
    pub const fn unset() -> Self {
        Self {
            page_number: Self::UNSET_PAGE,
            re_pos: None,
            auto_fit: None,
        }
    }

    #[must_use]
    pub const fn page(page_number: i32) -> Self {
        Self {
            page_number,
            re_pos: None,
            auto_fit: None,
        }
    }

    #[must_use]
    pub const fn with_sub_position(mut self, re_pos: SubPosition) -> Self {
        self.re_pos = Some(re_pos);
        self
    }

    #[must_use]
    pub const fn with_auto_fit(mut self, auto_fit: AutoFit) -> Self {
        self.auto_fit = Some(auto_fit);
        self
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.page_number >= 0
    }

    /// Page index as `usize`, `None` when unset
    #[must_use]
    pub fn page_index(&self) -> Option<usize> {
        usize::try_from(self.page_number).ok()
    }

    /// Parse, degrading to an unset viewport on malformed input
    pub fn parse_lossy(s: &str) -> Self {
        match s.parse() {
            Ok(viewport) => viewport,
            Err(e) => {
                warn!("Ignoring malformed viewport {s:?}: {e}");
                Self::unset()
            }
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::unset()
    }
}

impl PartialEq for Viewport {
    fn eq(&self, other: &Self) -> bool {
        self.page_number == other.page_number && self.re_pos == other.re_pos
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.page_number)?;
        if let Some(pos) = self.re_pos {
            write!(
                f,
                ";{}:{}:{}",
                pos.anchor.token(),
                pos.normalized_x,
                pos.normalized_y
            )?;
        }
        if let Some(fit) = self.auto_fit {
            let flag = |b: bool| if b { "T" } else { "F" };
            write!(f, ";AF1:{}:{}", flag(fit.width), flag(fit.height))?;
        }
        Ok(())
    }
}

fn parse_coordinate(raw: &str, token: &str) -> Result<f64, ViewportParseError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ViewportParseError::MalformedToken(token.to_string()))
}

fn parse_flag(raw: &str, token: &str) -> Result<bool, ViewportParseError> {
    match raw {
        "T" => Ok(true),
        "F" => Ok(false),
        _ => Err(ViewportParseError::MalformedToken(token.to_string())),
    }
}

impl FromStr for Viewport {
    type Err = ViewportParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ViewportParseError::Empty);
        }

        let mut tokens = s.split(';');
        let page_token = tokens.next().unwrap_or_default();
        let page_number = page_token
            .trim()
            .parse::<i32>()
            .ok()
            .filter(|p| *p >= Self::UNSET_PAGE)
            .ok_or_else(|| ViewportParseError::InvalidPage(page_token.to_string()))?;

        let mut viewport = Self::page(page_number);
        for token in tokens {
            let parts: Vec<&str> = token.split(':').collect();
            match parts.as_slice() {
                [kind @ ("C1" | "C2"), x, y] => {
                    let anchor = if *kind == "C1" {
                        Anchor::Center
                    } else {
                        Anchor::TopLeft
                    };
                    viewport.re_pos = Some(SubPosition {
                        normalized_x: parse_coordinate(x, token)?,
                        normalized_y: parse_coordinate(y, token)?,
                        anchor,
                    });
                }
                ["AF1", width, height] => {
                    viewport.auto_fit = Some(AutoFit {
                        width: parse_flag(width, token)?,
                        height: parse_flag(height, token)?,
                    });
                }
                ["C1" | "C2" | "AF1", ..] => {
                    return Err(ViewportParseError::MalformedToken(token.to_string()));
                }
                // forward compatibility: unknown tokens are skipped
                _ => {}
            }
        }

        Ok(viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(v: Viewport) -> Viewport {
        v.to_string().parse().unwrap()
    }

    #[test]
    fn plain_page_round_trips() {
        for page in [-1, 0, 1, 5, 4096] {
            let v = Viewport::page(page);
            assert_eq!(v.to_string(), page.to_string());
            assert_eq!(round_trip(v), v);
        }
    }

    #[test]
    fn sub_position_and_auto_fit_round_trip() {
        let v = Viewport::page(3)
            .with_sub_position(SubPosition::top_left(0.125, 1.0 / 3.0))
            .with_auto_fit(AutoFit {
                width: true,
                height: false,
            });
        let parsed = round_trip(v);
        assert_eq!(parsed, v);
        assert_eq!(parsed.auto_fit, v.auto_fit);
        assert_eq!(parsed.re_pos.unwrap().normalized_y, 1.0 / 3.0);

        let centered = Viewport::page(0).with_sub_position(SubPosition::center(0.5, 0.5));
        assert_eq!(centered.to_string(), "0;C1:0.5:0.5");
        assert_eq!(round_trip(centered), centered);
    }

    #[test]
    fn equality_ignores_auto_fit() {
        let a = Viewport::page(2);
        let b = Viewport::page(2).with_auto_fit(AutoFit {
            width: true,
            height: true,
        });
        assert_eq!(a, b);
        assert_ne!(a, a.with_sub_position(SubPosition::top_left(0.0, 0.0)));
    }

    #[test]
    fn unknown_tokens_are_skipped() {
        let v: Viewport = "7;ZZ:1".parse().unwrap();
        assert_eq!(v, Viewport::page(7));
    }

    #[test]
    fn malformed_strings_are_rejected() {
        assert_eq!("".parse::<Viewport>(), Err(ViewportParseError::Empty));
        assert!(matches!(
            "abc".parse::<Viewport>(),
            Err(ViewportParseError::InvalidPage(_))
        ));
        assert!(matches!(
            "-4".parse::<Viewport>(),
            Err(ViewportParseError::InvalidPage(_))
        ));
        assert!(matches!(
            "1;C2:x:0".parse::<Viewport>(),
            Err(ViewportParseError::MalformedToken(_))
        ));
        assert!(matches!(
            "1;AF1:T".parse::<Viewport>(),
            Err(ViewportParseError::MalformedToken(_))
        ));
    }

    #[test]
    fn lossy_parse_degrades_to_unset() {
        let v = Viewport::parse_lossy("not a viewport");
        assert!(!v.is_valid());
        assert_eq!(v.page_index(), None);
        assert_eq!(Viewport::parse_lossy("4").page_index(), Some(4));
    }
}
