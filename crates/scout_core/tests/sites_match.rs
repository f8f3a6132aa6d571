use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use scout_core::{Extraction, ListingSite, ScriptId, SiteGroup};

#[test]
fn loaded_pages_select_their_script() {
    let cases = [
        (
            "https://www.producthunt.com/leaderboard/daily/2026/10/18/all",
            Some(ScriptId::ProductHunt),
        ),
        ("https://peerlist.io/launchpad/2026/week/42", Some(ScriptId::Peerlist)),
        ("https://peerlist.io/jane/project/notes", Some(ScriptId::PeerlistDetail)),
        ("https://peerpush.net/?view=live", Some(ScriptId::PeerPush)),
        ("https://peerpush.net/p/widget", Some(ScriptId::PeerPushDetail)),
        ("https://www.uneed.best/", Some(ScriptId::Uneed)),
        ("https://fazier.com/launches/widget", Some(ScriptId::FazierDetail)),
        ("https://foundrlist.com/product/widget", Some(ScriptId::FoundrlistDetail)),
        ("https://theresanaiforthat.com/period/today/", Some(ScriptId::TheresAnAiForThat)),
        ("https://auraplusplus.com/trending?filter=today", Some(ScriptId::AuraPlusPlus)),
        ("https://auraplusplus.com/trending?filter=week", None),
        ("https://www.uneed.best/tool/widget", None),
        ("not a url", None),
    ];
    for (url, expected) in cases {
        assert_eq!(ScriptId::for_url(url), expected, "{url}");
    }
}

#[test]
fn every_launch_url_lands_on_a_bound_script() {
    let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    for site in ListingSite::ALL {
        let url = site.launch_url(today);
        if *site == ListingSite::NxgnTools {
            // Listing page itself carries no script; only its detail pages do.
            assert_eq!(ScriptId::for_url(&url), None);
            continue;
        }
        assert!(ScriptId::for_url(&url).is_some(), "{site} -> {url}");
    }
}

#[test]
fn product_hunt_opens_yesterdays_leaderboard() {
    let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    assert_eq!(
        ListingSite::ProductHunt.launch_url(today),
        "https://www.producthunt.com/leaderboard/daily/2026/2/28/all"
    );
    assert_eq!(
        ListingSite::Fazier.launch_url(today),
        "https://fazier.com/leaderboard/daily/2026/3/1"
    );
}

#[test]
fn peerlist_uses_the_iso_week() {
    let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    assert_eq!(
        ListingSite::Peerlist.launch_url(today),
        "https://peerlist.io/launchpad/2026/week/43"
    );
}

#[test]
fn groups_partition_the_presets() {
    let daily = ListingSite::in_group(SiteGroup::Daily);
    let weekly = ListingSite::in_group(SiteGroup::Weekly);
    assert!(daily.contains(&ListingSite::ProductHunt));
    assert!(weekly.contains(&ListingSite::Peerlist));
    assert!(!daily.contains(&ListingSite::PeerPush));
    assert!(!weekly.contains(&ListingSite::PeerPush));
    assert!(daily.iter().all(|s| !weekly.contains(s)));
}

#[test]
fn script_ids_round_trip_through_their_names() {
    for script in ScriptId::ALL {
        assert_eq!(script.as_str().parse::<ScriptId>(), Ok(*script));
    }
    assert!("myspace".parse::<ScriptId>().is_err());
}

#[test]
fn paginated_scripts_are_the_infinite_scroll_sites() {
    let paginated: Vec<_> = ScriptId::ALL
        .iter()
        .filter(|s| matches!(s.extraction(), Extraction::Paginated(_)))
        .copied()
        .collect();
    assert_eq!(paginated, vec![ScriptId::ProductHunt, ScriptId::Peerlist]);
}

#[test]
fn detail_scripts_are_the_ones_bound_to_single_product_pages() {
    let details: Vec<_> = ScriptId::ALL.iter().filter(|s| s.is_detail()).copied().collect();
    assert_eq!(
        details,
        vec![
            ScriptId::PeerlistDetail,
            ScriptId::PeerPushDetail,
            ScriptId::FazierDetail,
            ScriptId::FirstoDetail,
            ScriptId::FoundrlistDetail,
            ScriptId::NxgnToolsDetail,
        ]
    );
}
