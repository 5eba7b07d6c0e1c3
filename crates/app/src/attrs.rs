//! The standard attribute catalog.
//!
//! Attribute identities derive from canonic tag expressions, so every
//! client computes the same UIDs from the same names. The catalog covers
//! session bootstrap (login handshake, session errors, web launch) and the
//! common item attributes (child links, text labels, content tags).

use std::sync::{Arc, LazyLock as Lazy};

use plexus_api::{AttrDef, Registry};
use plexus_types::tag::{Name, Uid};
use plexus_types::values::{
    ErrValue, Login, LoginChallenge, LoginCheckpoint, LoginResponse, TagSet, TagValue,
};
use plexus_types::{PinRequest, Result, Value};

/// Context UID addressing ops at the session agent itself.
pub const SESSION_CONTEXT_ID: Uid = Uid([0, 8_675_309]);

/// Root tag families.
pub static APP_TAG: Lazy<Name> = Lazy::new(|| Name::from_expr("app"));
/// Session-scoped attribute family.
pub static SESSION_ATTR: Lazy<Name> = Lazy::new(|| Name::from_expr("session"));
/// Item-scoped attribute family.
pub static ITEM_ATTR: Lazy<Name> = Lazy::new(|| Name::from_expr("item"));

/// High-level app state family (settings, auth tokens).
pub static APP_STATE: Lazy<Name> = Lazy::new(|| APP_TAG.with("state"));

/// Member sign-in record.
pub static LOGIN_ID: Lazy<Uid> = Lazy::new(|| SESSION_ATTR.with("Login").id);
/// Host-issued sign-in challenge.
pub static LOGIN_CHALLENGE_ID: Lazy<Uid> = Lazy::new(|| SESSION_ATTR.with("LoginChallenge").id);
/// Client answer to a sign-in challenge.
pub static LOGIN_RESPONSE_ID: Lazy<Uid> = Lazy::new(|| SESSION_ATTR.with("LoginResponse").id);
/// Resumable session checkpoint.
pub static LOGIN_CHECKPOINT_ID: Lazy<Uid> = Lazy::new(|| SESSION_ATTR.with("LoginCheckpoint").id);
/// Session-level error report.
pub static SESSION_ERR_ID: Lazy<Uid> = Lazy::new(|| SESSION_ATTR.with("Err").id);
/// Session tag family (agent directives).
pub static SESSION_TAG: Lazy<Name> = Lazy::new(|| SESSION_ATTR.with("Tag"));
/// Directs the session agent to launch a web page.
pub static LAUNCH_WEB: Lazy<Uid> = Lazy::new(|| SESSION_TAG.with("www").id);
/// Directs the session agent to run an OAuth flow.
pub static LAUNCH_OAUTH: Lazy<Uid> = Lazy::new(|| SESSION_TAG.with("oauth").id);

/// Child link: each op's item UID is an inline child item UID.
pub static ITEM_LINK: Lazy<Uid> = Lazy::new(|| ITEM_ATTR.with("link.ID").id);

/// Text attribute family.
pub static ITEM_TEXT_TAG: Lazy<Name> = Lazy::new(|| ITEM_ATTR.with("text.Tag"));
/// Primary display label.
pub static ITEM_LABEL: Lazy<Uid> = Lazy::new(|| ITEM_TEXT_TAG.with("label").id);
/// Secondary caption.
pub static ITEM_CAPTION: Lazy<Uid> = Lazy::new(|| ITEM_TEXT_TAG.with("caption").id);
/// Collection grouping label.
pub static ITEM_COLLECTION: Lazy<Uid> = Lazy::new(|| ITEM_TEXT_TAG.with("collection").id);
/// Longer-form synopsis.
pub static ITEM_SYNOPSIS: Lazy<Uid> = Lazy::new(|| ITEM_TEXT_TAG.with("synopsis").id);

/// Content attribute family.
pub static ITEM_CONTENT: Lazy<Name> = Lazy::new(|| ITEM_ATTR.with("content"));
/// Primary media link.
pub static MAIN_LINK: Lazy<Uid> = Lazy::new(|| ITEM_CONTENT.with("Tag.link.main").id);
/// Media descriptor.
pub static ITEM_MEDIA: Lazy<Uid> = Lazy::new(|| ITEM_CONTENT.with("Tag.media").id);
/// Glyph (icon) tag set.
pub static ITEM_GLYPHS: Lazy<Uid> = Lazy::new(|| ITEM_CONTENT.with("Tags.glyphs").id);

/// URI prefix for glyphs, typically followed by a media (mime) type.
pub const CONTENT_GLYPH_URI: &str = "plexus:glyph/";

/// Glyph tags for a content type, e.g. `application/x-directory`.
pub fn tags_for_content_type(content_type: &str) -> TagSet {
    TagSet {
        head: Some(TagValue::from_uri(format!("{CONTENT_GLYPH_URI}{content_type}"))),
        sub_tags: Vec::new(),
    }
}

/// Registers `prototype` under `base.with(type_token)`, returning the full
/// attr expression.
pub fn register_attr(
    reg: &dyn Registry,
    base: &Name,
    type_token: &str,
    prototype: Arc<dyn Value>,
) -> Result<Name> {
    let expr = base.with(type_token);
    reg.register_attr(AttrDef {
        expr: expr.clone(),
        prototype,
    })?;
    Ok(expr)
}

/// Registers the standard value prototypes every session understands.
pub fn register_builtin_attrs(reg: &dyn Registry) -> Result<()> {
    register_attr(reg, &SESSION_ATTR, "Login", Arc::new(Login::default()))?;
    register_attr(
        reg,
        &SESSION_ATTR,
        "LoginChallenge",
        Arc::new(LoginChallenge::default()),
    )?;
    register_attr(
        reg,
        &SESSION_ATTR,
        "LoginResponse",
        Arc::new(LoginResponse::default()),
    )?;
    register_attr(
        reg,
        &SESSION_ATTR,
        "LoginCheckpoint",
        Arc::new(LoginCheckpoint::default()),
    )?;
    register_attr(reg, &SESSION_ATTR, "Err", Arc::new(ErrValue::default()))?;
    register_attr(reg, &SESSION_ATTR, "PinRequest", Arc::new(PinRequest::default()))?;
    register_attr(reg, &ITEM_ATTR, "link.ID", Arc::new(TagValue::default()))?;
    register_attr(reg, &ITEM_TEXT_TAG, "label", Arc::new(TagValue::default()))?;
    register_attr(reg, &ITEM_TEXT_TAG, "caption", Arc::new(TagValue::default()))?;
    register_attr(reg, &ITEM_CONTENT, "Tags.glyphs", Arc::new(TagSet::default()))?;
    Ok(())
}
