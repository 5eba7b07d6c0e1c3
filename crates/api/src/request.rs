//! The host-side binding of one pin request.

use std::collections::HashMap;
use std::sync::Arc;

use plexus_tx::TxMsg;
use plexus_types::tag::{Name, Uid};
use plexus_types::{ErrorKind, PinRequest, Result};

use crate::filter::ItemFilter;
use crate::host::Requester;

/// A parsed invocation URI: `[scheme://]domain/path?query`.
///
/// Deliberately narrower than a general URL — invocation URIs are
/// machine-minted, so the parser stays strict and dependency-free.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvokeUrl {
    /// The scheme, without `://`; empty when the URI had none.
    pub scheme: String,
    /// The authority/domain component; selects the app module.
    pub domain: String,
    /// Path segments following the domain.
    pub path: Vec<String>,
    /// Query pairs in order of appearance.
    pub query: Vec<(String, String)>,
}

impl InvokeUrl {
    /// Parses `uri`, failing with [`ErrorKind::BadRequest`] on an empty
    /// domain or stray delimiters.
    pub fn parse(uri: &str) -> Result<InvokeUrl> {
        let mut rest = uri.trim();
        let mut out = InvokeUrl::default();

        if let Some(at) = rest.find("://") {
            out.scheme = rest[..at].to_string();
            if out.scheme.is_empty() {
                return Err(ErrorKind::BadRequest.err(format!("bad invoke URI {uri:?}")));
            }
            rest = &rest[at + 3..];
        }

        let query = match rest.find('?') {
            Some(at) => {
                let q = &rest[at + 1..];
                rest = &rest[..at];
                q
            }
            None => "",
        };

        let mut segments = rest.split('/');
        out.domain = segments.next().unwrap_or_default().to_string();
        if out.domain.is_empty() {
            return Err(ErrorKind::BadRequest.err(format!("bad invoke URI {uri:?}")));
        }
        out.path = segments
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some((k, v)) => out.query.push((k.to_string(), v.to_string())),
                None => out.query.push((pair.to_string(), String::new())),
            }
        }
        Ok(out)
    }
}

/// A destination for [`Request::parse_param`].
pub trait ParamValue {
    /// Replaces `self` with the value parsed from `text`.
    fn parse_from(&mut self, text: &str) -> std::result::Result<(), String>;
}

impl ParamValue for String {
    fn parse_from(&mut self, text: &str) -> std::result::Result<(), String> {
        *self = text.to_string();
        Ok(())
    }
}

macro_rules! impl_param_int {
    ($($ty:ty),+) => {$(
        impl ParamValue for $ty {
            fn parse_from(&mut self, text: &str) -> std::result::Result<(), String> {
                *self = text.parse().map_err(|e| format!("{e}"))?;
                Ok(())
            }
        }
    )+};
}
impl_param_int!(i32, i64, u32, u64, usize);

/// One client pin request bound to its host-side state: the originating
/// requester, the accumulated [`ItemFilter`], the parsed invocation URL,
/// and query parameters.
pub struct Request {
    /// Origin of this request; receives pushed state and events.
    pub requester: Arc<dyn Requester>,
    /// Universally unique ID, inherited from the transaction that invoked
    /// this request.
    pub id: Uid,
    /// The initial transaction to process for this request, if any.
    pub tx: Option<Arc<TxMsg>>,
    /// Selects which nodes / attrs / items / edits to sync.
    pub filter: ItemFilter,
    /// Parsed from the current request's invoke URI.
    pub invoke_url: Option<InvokeUrl>,
    /// Query parameters of the invoke URI.
    pub params: HashMap<String, String>,
}

impl Request {
    /// A request bound to `requester` under the given UID.
    pub fn new(requester: Arc<dyn Requester>, id: Uid) -> Request {
        Request {
            requester,
            id,
            tx: None,
            filter: ItemFilter::default(),
            invoke_url: None,
            params: HashMap::new(),
        }
    }

    /// Merges an incoming pin request: overwrites the filter's current
    /// request, parses the invoke URI (failing with
    /// [`ErrorKind::BadRequest`]) and its query parameters, and
    /// force-normalizes the selector.
    pub fn revise(&mut self, pin_req: &PinRequest) -> Result<()> {
        self.filter.current = pin_req.clone();

        if let Some(invoke) = &pin_req.invoke {
            if !invoke.uri.is_empty() {
                let url = InvokeUrl::parse(&invoke.uri)
                    .map_err(|e| ErrorKind::BadRequest.err(format!("error parsing URL: {e}")))?;
                self.params = url.query.iter().cloned().collect();
                self.invoke_url = Some(url);
            }
        }

        if let Some(selector) = &pin_req.selector {
            self.filter.selector = selector.clone();
        }
        self.filter.selector.normalize(true)?;
        Ok(())
    }

    /// Interprets the invoke URL as an address:
    /// `{scheme}://{domain}/[{verb}/[{nodeID}/[{attrID}/[{itemID}]]]]`.
    ///
    /// Each path element past the verb parses as a base32 UID, a canonic
    /// tag literal, or the wildcard `*`, and the result lands in the
    /// selector as one span: a lone node ID selects every attr and item
    /// under it, a node+attr pair selects the attr's full item range, and
    /// a full triple selects exactly one item.
    pub fn parse_as_address_url(&mut self) -> Result<()> {
        let url = self
            .invoke_url
            .as_ref()
            .ok_or_else(|| ErrorKind::BadRequest.err("request carries no invoke URL"))?;

        let ids: Vec<Uid> = url
            .path
            .iter()
            .skip(1) // the verb
            .map(|seg| parse_path_id(seg))
            .collect();

        match ids.as_slice() {
            [] => {}
            [node] => self
                .filter
                .selector
                .add_span(*node, Uid::WILDCARD, Uid::NIL, Uid::MAX),
            [node, attr] => self.filter.selector.add_span(*node, *attr, Uid::NIL, Uid::MAX),
            [node, attr, item] => self.filter.selector.add_span(*node, *attr, *item, *item),
            _ => {
                return Err(ErrorKind::BadRequest.err(format!(
                    "address URL carries {} path IDs; at most 3 supported",
                    ids.len()
                )))
            }
        }
        self.filter.selector.normalize(true)
    }

    /// Parses the named query parameter into `dst` (integer and string
    /// destinations supported). Fails with [`ErrorKind::BadRequest`] on a
    /// missing key or a parse failure.
    pub fn parse_param<T: ParamValue>(&self, key: &str, dst: &mut T) -> Result<()> {
        let text = self
            .params
            .get(key)
            .ok_or_else(|| ErrorKind::BadRequest.err(format!("missing param {key:?}")))?;
        dst.parse_from(text)
            .map_err(|e| ErrorKind::BadRequest.err(format!("param {key:?}: {e}")))
    }

    /// A compact label for logs.
    pub fn label(&self) -> String {
        format!("request {} [{}]", self.id.label(), self.filter.label())
    }
}

/// A path element: the wildcard `*`, a base32 UID, or a canonic tag
/// literal hashed through the identity algebra.
fn parse_path_id(segment: &str) -> Uid {
    if segment == "*" {
        return Uid::WILDCARD;
    }
    match Uid::parse_base32(segment) {
        Ok(uid) => uid,
        Err(_) => Name::from_expr(segment).id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use plexus_task::Context;
    use plexus_types::values::TagValue;
    use plexus_types::{PinMode, Value};

    #[derive(Default)]
    struct NullRequester;

    #[async_trait]
    impl crate::host::TxReceiver for NullRequester {
        async fn push_tx(&self, _tx: Arc<TxMsg>, _ctx: &Context) -> Result<()> {
            Ok(())
        }
    }

    impl Requester for NullRequester {
        fn recv_event(&self, _event: crate::host::PinEvent) {}
    }

    fn request() -> Request {
        Request::new(Arc::new(NullRequester), Uid::now())
    }

    fn pin_request(uri: &str) -> PinRequest {
        PinRequest {
            mode: PinMode::Snapshot,
            invoke: Some(TagValue::from_uri(uri)),
            selector: None,
        }
    }

    #[test]
    fn invoke_url_parses_fully() {
        let url = InvokeUrl::parse("plexus://cabinets/open/zz?depth=2&raw").unwrap();
        assert_eq!(url.scheme, "plexus");
        assert_eq!(url.domain, "cabinets");
        assert_eq!(url.path, vec!["open", "zz"]);
        assert_eq!(
            url.query,
            vec![
                ("depth".to_string(), "2".to_string()),
                ("raw".to_string(), String::new())
            ]
        );

        let bare = InvokeUrl::parse("cabinets/~").unwrap();
        assert_eq!(bare.scheme, "");
        assert_eq!(bare.domain, "cabinets");
        assert_eq!(bare.path, vec!["~"]);
    }

    #[test]
    fn invoke_url_rejects_empty_domain() {
        for bad in ["", "://x", "plexus:///verb"] {
            let err = InvokeUrl::parse(bad).unwrap_err();
            assert_eq!(err.kind, ErrorKind::BadRequest, "uri {bad:?}");
        }
    }

    #[test]
    fn revise_parses_uri_and_params() {
        let mut req = request();
        req.revise(&pin_request("plexus://cabinets/open?limit=12&name=top"))
            .unwrap();

        assert_eq!(req.invoke_url.as_ref().unwrap().domain, "cabinets");

        let mut limit = 0i64;
        req.parse_param("limit", &mut limit).unwrap();
        assert_eq!(limit, 12);

        let mut name = String::new();
        req.parse_param("name", &mut name).unwrap();
        assert_eq!(name, "top");

        let missing = req.parse_param("absent", &mut name).unwrap_err();
        assert_eq!(missing.kind, ErrorKind::BadRequest);

        let bad = req.parse_param("name", &mut limit).unwrap_err();
        assert_eq!(bad.kind, ErrorKind::BadRequest);
    }

    #[test]
    fn revise_rejects_bad_uri() {
        let mut req = request();
        let err = req.revise(&pin_request("://nope")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadRequest);
    }

    #[test]
    fn address_url_spans() {
        // one ID: the whole node
        let mut req = request();
        let node = Uid([0, 77]);
        req.revise(&pin_request(&format!("plexus://cab/open/{}", node.base32())))
            .unwrap();
        req.parse_as_address_url().unwrap();
        let span = req.filter.selector.spans[0];
        assert_eq!(span.node, node);
        assert!(span.attr.is_wildcard());
        assert_eq!(span.item_min, Uid::NIL);
        assert_eq!(span.item_max, Uid::MAX);

        // three IDs: exactly one element
        let mut req = request();
        let attr = Uid([0, 88]);
        let item = Uid([0, 99]);
        req.revise(&pin_request(&format!(
            "plexus://cab/open/{}/{}/{}",
            node.base32(),
            attr.base32(),
            item.base32()
        )))
        .unwrap();
        req.parse_as_address_url().unwrap();
        let span = req.filter.selector.spans[0];
        assert_eq!((span.node, span.attr), (node, attr));
        assert_eq!((span.item_min, span.item_max), (item, item));
    }

    #[test]
    fn address_url_accepts_tag_literals_and_wildcard() {
        let mut req = request();
        req.revise(&pin_request("plexus://cab/open/my.node/*"))
            .unwrap();
        req.parse_as_address_url().unwrap();
        let span = req.filter.selector.spans[0];
        assert_eq!(span.node, Name::from_expr("my.node").id);
        assert!(span.attr.is_wildcard());
    }

    #[test]
    fn value_prototype_shim_compiles() {
        // AttrDef prototypes are Arc<dyn Value>; ensure object safety here
        let proto: Arc<dyn Value> = Arc::new(TagValue::default());
        assert!(proto.new_value().as_any().downcast_ref::<TagValue>().is_some());
    }
}
