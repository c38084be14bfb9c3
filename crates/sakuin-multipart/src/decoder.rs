use bytes::Bytes;
use futures::Stream;
use mime::Mime;
use multer::Multipart;
use serde::de::IgnoredAny;

use crate::error::{DecodeError, DecodeResult};

/// Form field carrying the JSON metadata document.
pub const METADATA_FIELD: &str = "metadata";

/// Form field carrying the raw object bytes.
pub const OBJECT_FIELD: &str = "object";

/// The parts extracted from one index request body.
///
/// Either part may be absent. `metadata` holds exactly the bytes of the
/// first JSON value found in the metadata field; `object` holds the full
/// contents of the object field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parts {
    pub metadata: Option<Bytes>,
    pub object: Option<Bytes>,
}

impl Parts {
    pub fn is_empty(&self) -> bool {
        self.metadata.is_none() && self.object.is_none()
    }
}

enum Field {
    Metadata,
    Object,
}

/// Decode a `multipart/form-data` body in a single pass.
///
/// Fields other than [`METADATA_FIELD`] and [`OBJECT_FIELD`] are skipped.
/// When a field name repeats, the last occurrence wins. A failure of the
/// body stream is returned as [`DecodeError::Read`] carrying the stream's
/// own error.
pub async fn read_parts<S, O, E>(body: S, content_type: &str) -> DecodeResult<Parts>
where
    S: Stream<Item = Result<O, E>> + Send + 'static,
    O: Into<Bytes> + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let boundary = parse_boundary(content_type)?;
    let mut multipart = Multipart::new(body, boundary);
    let mut parts = Parts::default();

    while let Some(field) = multipart.next_field().await? {
        let target = match field.name() {
            Some(METADATA_FIELD) => Field::Metadata,
            Some(OBJECT_FIELD) => Field::Object,
            _ => continue,
        };
        let data = field.bytes().await?;
        match target {
            Field::Metadata => parts.metadata = Some(first_json_value(data)?),
            Field::Object => parts.object = Some(data),
        }
    }

    Ok(parts)
}

fn parse_boundary(content_type: &str) -> DecodeResult<String> {
    let mime: Mime = content_type
        .parse()
        .map_err(|_| DecodeError::InvalidContentType(content_type.to_owned()))?;
    if mime.type_() != mime::MULTIPART || mime.subtype() != mime::FORM_DATA {
        return Err(DecodeError::InvalidContentType(
            mime.essence_str().to_owned(),
        ));
    }
    mime.get_param(mime::BOUNDARY)
        .map(|boundary| boundary.as_str().to_owned())
        .ok_or(DecodeError::MissingBoundary)
}

/// Slice out the first JSON value in `part`. Anything after it is ignored.
fn first_json_value(part: Bytes) -> DecodeResult<Bytes> {
    let mut values = serde_json::Deserializer::from_slice(&part).into_iter::<IgnoredAny>();
    match values.next() {
        Some(Ok(_)) => {
            let end = values.byte_offset();
            let start = part
                .iter()
                .position(|b| !b.is_ascii_whitespace())
                .unwrap_or(0);
            Ok(part.slice(start..end))
        }
        Some(Err(e)) => Err(DecodeError::Metadata(e)),
        None => Err(DecodeError::EmptyMetadata),
    }
}
