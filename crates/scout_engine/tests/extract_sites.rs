use pretty_assertions::assert_eq;
use scout_core::ScriptId;
use scout_engine::{static_extractor, ExtractError};

fn extract(script: ScriptId, html: &str) -> Vec<String> {
    static_extractor(script).expect("static script").extract(html)
}

#[test]
fn auraplusplus_keeps_only_outbound_titled_links() {
    let html = r#"<body>
        <a href="https://a.com" title="A">A</a>
        <a href="https://open-launch.com/x" title="B">B</a>
        <a href="https://auraplusplus.com/y" title="C">C</a>
    </body>"#;
    assert_eq!(extract(ScriptId::AuraPlusPlus, html), vec!["https://a.com"]);
}

#[test]
fn extraction_is_idempotent_on_the_same_snapshot() {
    let html = r#"<a href="https://a.com" title="A">A</a><a href="https://b.com" title="B">B</a>"#;
    let first = extract(ScriptId::AuraPlusPlus, html);
    assert_eq!(first, extract(ScriptId::AuraPlusPlus, html));
    assert_eq!(first, vec!["https://a.com", "https://b.com"]);
}

#[test]
fn duplicates_keep_first_occurrence_order() {
    let html = r#"
        <a href="https://b.com">b</a>
        <a href="https://a.com">a</a>
        <a href="https://b.com">b again</a>
        <a href="http://insecure.com">plain http</a>
        <a href="https://tinylaunch.com/launch/1">internal</a>"#;
    assert_eq!(
        extract(ScriptId::TinyLaunch, html),
        vec!["https://b.com", "https://a.com"]
    );
}

#[test]
fn titled_links_are_rejected_on_firsto_listings() {
    let html = r#"
        <a href="https://tool.dev" title="Tool">Tool</a>
        <a href="https://other.dev">Other</a>"#;
    assert_eq!(extract(ScriptId::Firsto, html), vec!["https://other.dev"]);
}

#[test]
fn firsto_detail_requires_the_tracking_attribute() {
    let html = r#"
        <a href="https://untracked.dev">plain</a>
        <a href="https://tool.dev" data-umami-event="visit">Visit</a>"#;
    assert_eq!(extract(ScriptId::FirstoDetail, html), vec!["https://tool.dev"]);
}

#[test]
fn fazier_listing_links_resolve_against_the_site() {
    let html = r#"
        <a href="/launches/cool-tool">Cool tool</a>
        <a href="/about">About</a>
        <a href="/launches/cool-tool">dup</a>"#;
    assert_eq!(
        extract(ScriptId::Fazier, html),
        vec!["https://fazier.com/launches/cool-tool"]
    );
}

#[test]
fn detail_pages_yield_only_the_first_referral_link() {
    let html = r#"
        <a href="https://one.dev/?ref=peerlist">one</a>
        <a href="https://two.dev/?ref=peerlist">two</a>"#;
    assert_eq!(
        extract(ScriptId::PeerlistDetail, html),
        vec!["https://one.dev/?ref=peerlist"]
    );
}

#[test]
fn uneed_requires_https_and_its_referral_tag() {
    let html = r#"
        <a href="http://one.dev/?ref=uneed.best">http</a>
        <a href="https://two.dev/?ref=uneed.best">ok</a>
        <a href="https://three.dev/">untagged</a>"#;
    assert_eq!(
        extract(ScriptId::Uneed, html),
        vec!["https://two.dev/?ref=uneed.best"]
    );
}

#[test]
fn list_items_carry_their_url_in_a_data_attribute() {
    let html = r#"<ul>
        <li data-url="https://ai.tool">AI tool</li>
        <li data-url="https://theresanaiforthat.com/ai/x">internal</li>
        <li>no url</li>
    </ul>"#;
    assert_eq!(
        extract(ScriptId::TheresAnAiForThat, html),
        vec!["https://ai.tool"]
    );
}

#[test]
fn visit_link_matches_collapsed_label_text() {
    let html = r#"
        <a href="https://nav.example">Home</a>
        <a href="https://product.example">
            Visit
            Website
        </a>"#;
    assert_eq!(
        extract(ScriptId::FoundrlistDetail, html),
        vec!["https://product.example"]
    );
    assert!(extract(ScriptId::PeerPushDetail, html).is_empty());
}

#[test]
fn empty_documents_yield_nothing() {
    for script in ScriptId::ALL {
        if let Ok(extractor) = static_extractor(*script) {
            assert!(extractor.extract("").is_empty(), "{script}");
        }
    }
}

#[test]
fn dynamic_scripts_have_no_static_extractor() {
    assert!(matches!(
        static_extractor(ScriptId::ProductHunt),
        Err(ExtractError::NotStatic(ScriptId::ProductHunt))
    ));
    assert!(static_extractor(ScriptId::PeerPush).is_err());
}
