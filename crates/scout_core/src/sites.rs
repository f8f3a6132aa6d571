//! Static site configuration: content-script bindings and listing pages.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::pattern::UrlPattern;
use crate::timings::SiteTimings;

/// Redirect marker shared by several launch directories; links carrying it
/// point back into the directory network rather than at a product.
pub const OPEN_LAUNCH_MARKER: &str = "open-launch";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleRule {
    Any,
    /// A non-empty `title` attribute is required.
    Required,
    /// The element must not carry a `title` attribute.
    Forbidden,
}

/// Declarative anchor-style extraction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorSpec {
    /// CSS selector for the candidate elements (e.g. `a`, `main a`, `li`).
    pub selector: &'static str,
    /// Attribute holding the URL.
    pub url_attr: &'static str,
    pub require_https: bool,
    pub must_contain: Option<&'static str>,
    pub exclude: &'static [&'static str],
    pub title: TitleRule,
    pub required_attr: Option<&'static str>,
    /// Base for resolving relative URLs. Without one, relative URLs are kept as-is.
    pub base_url: Option<&'static str>,
    pub first_only: bool,
}

impl AnchorSpec {
    pub const fn links() -> Self {
        Self {
            selector: "a",
            url_attr: "href",
            require_https: false,
            must_contain: None,
            exclude: &[],
            title: TitleRule::Any,
            required_attr: None,
            base_url: None,
            first_only: false,
        }
    }

    pub const fn outbound(exclude: &'static [&'static str]) -> Self {
        let mut spec = Self::links();
        spec.require_https = true;
        spec.exclude = exclude;
        spec
    }
}

/// Identifier scan over the serialized document during pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSpec {
    /// Regex whose first capture group (or whole match) is the item identifier.
    pub pattern: &'static str,
    /// URL template; `{id}` is replaced with the identifier.
    pub url_template: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    Anchors(AnchorSpec),
    /// First anchor whose visible text equals the label.
    VisitLink { label: &'static str },
    Paginated(ScanSpec),
    /// Image tiles without anchors, reached through simulated clicks.
    Tiles { selector: &'static str },
}

macro_rules! script_ids {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// One content script: a site variant bound to a set of page patterns.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum ScriptId {
            $($variant),+
        }

        impl ScriptId {
            pub const ALL: &'static [ScriptId] = &[$(ScriptId::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(ScriptId::$variant => $name),+
                }
            }
        }

        impl FromStr for ScriptId {
            type Err = UnknownSite;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(ScriptId::$variant),)+
                    other => Err(UnknownSite(other.to_string())),
                }
            }
        }
    };
}

script_ids! {
    ProductHunt => "producthunt",
    Peerlist => "peerlist",
    PeerlistDetail => "peerlist-detail",
    PeerPush => "peerpush",
    PeerPushDetail => "peerpush-detail",
    Uneed => "uneed",
    Fazier => "fazier",
    FazierDetail => "fazier-detail",
    Firsto => "firsto",
    FirstoDetail => "firsto-detail",
    FoundrlistDetail => "foundrlist-detail",
    LaunchItX => "launchitx",
    NxgnToolsDetail => "nxgntools-detail",
    OpenHunts => "openhunts",
    OpenLaunch => "openlaunch",
    StartupFast => "startupfast",
    TheresAnAiForThat => "theresanaiforthat",
    TinyLaunch => "tinylaunch",
    AuraPlusPlus => "auraplusplus",
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSite(pub String);

impl fmt::Display for UnknownSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown site '{}'", self.0)
    }
}

impl std::error::Error for UnknownSite {}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ScriptId {
    pub fn match_patterns(self) -> &'static [&'static str] {
        match self {
            ScriptId::ProductHunt => &["https://www.producthunt.com/leaderboard/daily/*/*/*/*"],
            ScriptId::Peerlist => &["https://peerlist.io/launchpad/*/*/*"],
            ScriptId::PeerlistDetail => &["https://peerlist.io/*/project/*"],
            ScriptId::PeerPush => &["https://peerpush.net/?view=live"],
            ScriptId::PeerPushDetail => &["https://peerpush.net/p/*"],
            ScriptId::Uneed => &["https://www.uneed.best/"],
            ScriptId::Fazier => &["https://fazier.com/leaderboard/daily/*/*/*"],
            ScriptId::FazierDetail => &["https://fazier.com/launches/*"],
            ScriptId::Firsto => &["https://firsto.co/trending?filter=today"],
            ScriptId::FirstoDetail => &["https://firsto.co/projects/*"],
            ScriptId::FoundrlistDetail => &[
                "https://foundrlist.com/startup/**",
                "https://foundrlist.com/product/**",
            ],
            ScriptId::LaunchItX => &["https://launchitx.com/trending?filter=today"],
            ScriptId::NxgnToolsDetail => &["https://www.nxgntools.com/tools/*"],
            ScriptId::OpenHunts => &["https://openhunts.com/trending?filter=today"],
            ScriptId::OpenLaunch => &["https://open-launch.com/trending?filter=today"],
            ScriptId::StartupFast => &["https://www.startupfa.st/trending?filter=today"],
            ScriptId::TheresAnAiForThat => &["https://theresanaiforthat.com/period/*"],
            ScriptId::TinyLaunch => &["https://www.tinylaunch.com/"],
            ScriptId::AuraPlusPlus => &["https://auraplusplus.com/trending?filter=today"],
        }
    }

    pub fn patterns(self) -> Vec<UrlPattern> {
        self.match_patterns()
            .iter()
            .filter_map(|p| UrlPattern::parse(p).ok())
            .collect()
    }

    /// The script bound to a loaded page, if any.
    pub fn for_url(url: &str) -> Option<ScriptId> {
        let parsed = url::Url::parse(url).ok()?;
        ScriptId::ALL
            .iter()
            .copied()
            .find(|script| script.patterns().iter().any(|p| p.matches(&parsed)))
    }

    pub fn extraction(self) -> Extraction {
        match self {
            ScriptId::ProductHunt => Extraction::Paginated(ScanSpec {
                pattern: r"post-item-(\d+)",
                url_template: "https://www.producthunt.com/r/p/{id}",
            }),
            ScriptId::Peerlist => Extraction::Paginated(ScanSpec {
                pattern: r#"/[^/]+/project/[^/"]+"#,
                url_template: "https://peerlist.io{id}",
            }),
            ScriptId::PeerlistDetail => Extraction::Anchors(AnchorSpec {
                must_contain: Some("ref=peerlist"),
                first_only: true,
                ..AnchorSpec::links()
            }),
            ScriptId::PeerPush => Extraction::Tiles {
                selector: "#launches img",
            },
            ScriptId::PeerPushDetail => Extraction::VisitLink { label: "Visit site" },
            ScriptId::Uneed => Extraction::Anchors(AnchorSpec {
                require_https: true,
                must_contain: Some("ref=uneed.best"),
                ..AnchorSpec::links()
            }),
            ScriptId::Fazier => Extraction::Anchors(AnchorSpec {
                must_contain: Some("launches"),
                base_url: Some("https://fazier.com/"),
                ..AnchorSpec::links()
            }),
            ScriptId::FazierDetail => Extraction::Anchors(AnchorSpec {
                must_contain: Some("ref=fazier"),
                first_only: true,
                ..AnchorSpec::links()
            }),
            ScriptId::Firsto => Extraction::Anchors(AnchorSpec {
                title: TitleRule::Forbidden,
                ..AnchorSpec::outbound(&["firsto", OPEN_LAUNCH_MARKER])
            }),
            ScriptId::FirstoDetail => Extraction::Anchors(AnchorSpec {
                required_attr: Some("data-umami-event"),
                ..AnchorSpec::outbound(&["firsto", OPEN_LAUNCH_MARKER])
            }),
            ScriptId::FoundrlistDetail | ScriptId::NxgnToolsDetail => Extraction::VisitLink {
                label: "Visit Website",
            },
            ScriptId::LaunchItX => Extraction::Anchors(AnchorSpec {
                selector: "main a",
                ..AnchorSpec::outbound(&[OPEN_LAUNCH_MARKER, "launchitx"])
            }),
            ScriptId::OpenHunts => {
                Extraction::Anchors(AnchorSpec::outbound(&[OPEN_LAUNCH_MARKER, "openhunts"]))
            }
            ScriptId::OpenLaunch => Extraction::Anchors(AnchorSpec {
                title: TitleRule::Required,
                ..AnchorSpec::outbound(&[OPEN_LAUNCH_MARKER])
            }),
            ScriptId::StartupFast => Extraction::Anchors(AnchorSpec {
                title: TitleRule::Required,
                ..AnchorSpec::outbound(&["startupfa", OPEN_LAUNCH_MARKER])
            }),
            ScriptId::TheresAnAiForThat => Extraction::Anchors(AnchorSpec {
                selector: "li",
                url_attr: "data-url",
                ..AnchorSpec::outbound(&["theresanaiforthat"])
            }),
            ScriptId::TinyLaunch => Extraction::Anchors(AnchorSpec::outbound(&["tinylaunch"])),
            ScriptId::AuraPlusPlus => Extraction::Anchors(AnchorSpec {
                title: TitleRule::Required,
                ..AnchorSpec::outbound(&[OPEN_LAUNCH_MARKER, "auraplusplus"])
            }),
        }
    }

    pub fn is_detail(self) -> bool {
        matches!(
            self,
            ScriptId::PeerlistDetail
                | ScriptId::PeerPushDetail
                | ScriptId::FazierDetail
                | ScriptId::FirstoDetail
                | ScriptId::FoundrlistDetail
                | ScriptId::NxgnToolsDetail
        )
    }

    pub fn default_timings(self) -> SiteTimings {
        let mut timings = SiteTimings::default();
        match self {
            ScriptId::ProductHunt | ScriptId::Peerlist | ScriptId::PeerPush => {
                timings.pre_open_pause = Duration::from_secs(1);
            }
            _ => {}
        }
        match self {
            ScriptId::Uneed => timings.initial_wait = Duration::from_secs(10),
            ScriptId::FoundrlistDetail | ScriptId::PeerPush => {
                timings.initial_wait = Duration::from_secs(5)
            }
            _ => {}
        }
        // These directories fire their opens back to back.
        if matches!(
            self,
            ScriptId::AuraPlusPlus
                | ScriptId::LaunchItX
                | ScriptId::OpenHunts
                | ScriptId::FirstoDetail
        ) {
            timings.inter_tab_delay = Duration::ZERO;
        }
        timings
    }
}

/// Listing page groups offered as presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteGroup {
    Daily,
    Weekly,
}

impl FromStr for SiteGroup {
    type Err = UnknownSite;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(SiteGroup::Daily),
            "weekly" => Ok(SiteGroup::Weekly),
            other => Err(UnknownSite(other.to_string())),
        }
    }
}

/// A listing page the user can launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListingSite {
    ProductHunt,
    StartupFast,
    Uneed,
    Fazier,
    OpenLaunch,
    Firsto,
    Peerlist,
    TinyLaunch,
    AuraPlusPlus,
    OpenHunts,
    LaunchItX,
    PeerPush,
    NxgnTools,
}

impl ListingSite {
    pub const ALL: &'static [ListingSite] = &[
        ListingSite::ProductHunt,
        ListingSite::StartupFast,
        ListingSite::Uneed,
        ListingSite::Fazier,
        ListingSite::OpenLaunch,
        ListingSite::Firsto,
        ListingSite::Peerlist,
        ListingSite::TinyLaunch,
        ListingSite::AuraPlusPlus,
        ListingSite::OpenHunts,
        ListingSite::LaunchItX,
        ListingSite::PeerPush,
        ListingSite::NxgnTools,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ListingSite::ProductHunt => "productHunt",
            ListingSite::StartupFast => "startupfast",
            ListingSite::Uneed => "uneed",
            ListingSite::Fazier => "fazier",
            ListingSite::OpenLaunch => "openLaunch",
            ListingSite::Firsto => "firsto",
            ListingSite::Peerlist => "peerlist",
            ListingSite::TinyLaunch => "tinylaunch",
            ListingSite::AuraPlusPlus => "auraplusplus",
            ListingSite::OpenHunts => "openhunts",
            ListingSite::LaunchItX => "launchitx",
            ListingSite::PeerPush => "peerpush",
            ListingSite::NxgnTools => "nxgntools",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ListingSite::ProductHunt => "product hunt",
            ListingSite::StartupFast => "startupfa.st",
            ListingSite::OpenLaunch => "open-launch",
            other => other.id(),
        }
    }

    /// Listing sites that need their own browser window.
    pub fn own_window(self) -> bool {
        matches!(self, ListingSite::PeerPush)
    }

    pub fn groups(self) -> &'static [SiteGroup] {
        match self {
            ListingSite::ProductHunt
            | ListingSite::StartupFast
            | ListingSite::Uneed
            | ListingSite::Fazier
            | ListingSite::OpenLaunch
            | ListingSite::Firsto
            | ListingSite::AuraPlusPlus
            | ListingSite::OpenHunts
            | ListingSite::LaunchItX => &[SiteGroup::Daily],
            ListingSite::Peerlist | ListingSite::TinyLaunch | ListingSite::NxgnTools => {
                &[SiteGroup::Weekly]
            }
            ListingSite::PeerPush => &[],
        }
    }

    pub fn in_group(group: SiteGroup) -> Vec<ListingSite> {
        ListingSite::ALL
            .iter()
            .copied()
            .filter(|site| site.groups().contains(&group))
            .collect()
    }

    /// The page to open for the given local date.
    pub fn launch_url(self, today: NaiveDate) -> String {
        match self {
            ListingSite::ProductHunt => {
                let day = today.checked_sub_days(Days::new(1)).unwrap_or(today);
                format!(
                    "https://www.producthunt.com/leaderboard/daily/{}/{}/{}/all",
                    day.year(),
                    day.month(),
                    day.day()
                )
            }
            ListingSite::Fazier => format!(
                "https://fazier.com/leaderboard/daily/{}/{}/{}",
                today.year(),
                today.month(),
                today.day()
            ),
            ListingSite::Peerlist => format!(
                "https://peerlist.io/launchpad/{}/week/{}",
                today.year(),
                today.iso_week().week()
            ),
            ListingSite::StartupFast => "https://www.startupfa.st/trending?filter=today".into(),
            ListingSite::Uneed => "https://www.uneed.best/".into(),
            ListingSite::OpenLaunch => "https://open-launch.com/trending?filter=today".into(),
            ListingSite::Firsto => "https://firsto.co/trending?filter=today".into(),
            ListingSite::TinyLaunch => "https://www.tinylaunch.com/".into(),
            ListingSite::AuraPlusPlus => "https://auraplusplus.com/trending?filter=today".into(),
            ListingSite::OpenHunts => "https://openhunts.com/trending?filter=today".into(),
            ListingSite::LaunchItX => "https://launchitx.com/trending?filter=today".into(),
            ListingSite::PeerPush => "https://peerpush.net/?view=live".into(),
            ListingSite::NxgnTools => "https://www.nxgntools.com/launching".into(),
        }
    }
}

impl FromStr for ListingSite {
    type Err = UnknownSite;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ListingSite::ALL
            .iter()
            .copied()
            .find(|site| site.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSite(s.to_string()))
    }
}

impl fmt::Display for ListingSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
