//! Standard wire values: tags, login records, and errors-as-values.

use parity_scale_codec::{Decode, Encode};

use crate::error::{Error, ErrorKind};
use crate::impl_value;
use crate::tag::Uid;

/// A general-purpose reference: a UID, a URI, inline text, or any mix.
///
/// Tags ride inside requests (the invocation URI), inside attributes
/// (labels, links, glyphs), and inside login records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct TagValue {
    /// Referenced UID, if any.
    pub uid: Uid,
    /// Referenced URI, if any.
    pub uri: String,
    /// Inline text, if any.
    pub text: String,
    /// Media (mime) type qualifying `uri`, if any.
    pub content_type: String,
}

impl TagValue {
    /// A tag referencing only a UID.
    pub fn from_uid(uid: Uid) -> TagValue {
        TagValue {
            uid,
            ..TagValue::default()
        }
    }

    /// A tag referencing only a URI.
    pub fn from_uri(uri: impl Into<String>) -> TagValue {
        TagValue {
            uri: uri.into(),
            ..TagValue::default()
        }
    }

    /// A tag carrying only inline text.
    pub fn from_text(text: impl Into<String>) -> TagValue {
        TagValue {
            text: text.into(),
            ..TagValue::default()
        }
    }

    /// True when every field is empty.
    pub fn is_nil(&self) -> bool {
        self.uid.is_nil() && self.uri.is_empty() && self.text.is_empty()
    }

    /// A compact label for logs: truncated URI, text, and UID suffix.
    pub fn label(&self) -> String {
        let mut out = String::with_capacity(128);
        if !self.uri.is_empty() {
            out.extend(self.uri.chars().take(80));
        }
        if !self.text.is_empty() {
            if !out.is_empty() {
                out.push('.');
            }
            out.extend(self.text.chars().take(80));
        }
        if self.uid.is_set() {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(&self.uid.label());
        }
        out
    }
}

/// An ordered set of tags with a distinguished head.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct TagSet {
    /// The primary tag.
    pub head: Option<TagValue>,
    /// Qualifying sub-tags.
    pub sub_tags: Vec<TagValue>,
}

/// A member sign-in record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct Login {
    /// Who is signing in.
    pub member: Option<TagValue>,
    /// Where the member's home host lives.
    pub host_address: String,
}

/// A host-issued challenge during sign-in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct LoginChallenge {
    /// Host-chosen bytes the client must respond to.
    pub challenge: Vec<u8>,
}

/// The client's answer to a [`LoginChallenge`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct LoginResponse {
    /// Keyed hash over the challenge.
    pub hash_response: Vec<u8>,
}

/// A resumable session checkpoint issued after sign-in completes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct LoginCheckpoint {
    /// The session this checkpoint can resume.
    pub session: Option<TagValue>,
}

/// An [`Error`] in wire form, so failures can ride inside transactions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct ErrValue {
    /// Stable numeric code; see [`ErrorKind`].
    pub code: u32,
    /// Human-readable detail.
    pub msg: String,
}

impl From<&Error> for ErrValue {
    fn from(err: &Error) -> Self {
        ErrValue {
            code: err.kind as u32,
            msg: err.msg.clone(),
        }
    }
}

impl From<&ErrValue> for Error {
    fn from(v: &ErrValue) -> Self {
        ErrorKind::from_code(v.code).err(v.msg.clone())
    }
}

impl_value!(TagValue, TagSet, Login, LoginChallenge, LoginResponse, LoginCheckpoint, ErrValue);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn value_roundtrip() {
        let login = Login {
            member: Some(TagValue::from_text("astar")),
            host_address: "batwing ave".to_string(),
        };
        let mut store = Vec::new();
        login.marshal_to_store(&mut store).unwrap();

        let mut decoded = Login::default();
        decoded.unmarshal(&store).unwrap();
        assert_eq!(decoded, login);
    }

    #[test]
    fn prototype_clones_default() {
        let proto: Box<dyn Value> = Box::new(TagValue::from_text("x"));
        let fresh = proto.new_value();
        let tag = fresh.as_any().downcast_ref::<TagValue>().unwrap();
        assert!(tag.is_nil());
    }

    #[test]
    fn err_value_preserves_kind() {
        let err = ErrorKind::PinFailed.err("cell gone");
        let wire = ErrValue::from(&err);
        let back = Error::from(&wire);
        assert_eq!(back, err);
    }
}
