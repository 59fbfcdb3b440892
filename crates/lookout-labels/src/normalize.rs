use lookout_codec::DecodeError;
use serde_json::{Map, Value};
use tracing::trace;

use crate::{
    error::{LabelError, LabelResult},
    kind::LabelKind,
    transfer::Transfer,
};

/// Tag naming a label object's kind.
pub const KIND_FIELD: &str = "_cls";
/// Identifier as stored by the label server.
pub const INTERNAL_ID_FIELD: &str = "_id";
/// Identifier as exposed to the host.
pub const ID_FIELD: &str = "id";
/// Per-frame records of a video sample.
pub const FRAMES_FIELD: &str = "frames";

/// Normalize one label record in place and return the arrays it decoded.
///
/// All encoded fields are decoded before the record is touched.
///
/// # Errors
///
/// [`LabelError::Decode`] naming the first field whose array could not be
/// decoded. The record is then left exactly as it arrived.
pub fn normalize(record: &mut Map<String, Value>) -> LabelResult<Transfer> {
    let mut transfer = Transfer::new();
    normalize_into(record, &mut transfer)?;
    Ok(transfer)
}

/// Like [`normalize`], appending to an existing transfer so buffer indices
/// stay unique across several records.
///
/// # Errors
///
/// See [`normalize`]. `transfer` is not extended on error.
pub fn normalize_into(record: &mut Map<String, Value>, transfer: &mut Transfer) -> LabelResult<()> {
    Target::Record(record).normalize(transfer)
}

/// Normalize a sample and, for video samples, each of its per-frame
/// records. Buffers from all frames land in one transfer.
///
/// # Errors
///
/// [`LabelError::NotAnObject`] if `sample` is not a JSON object, otherwise
/// see [`normalize`]. A decode failure in any frame leaves the whole sample
/// untouched.
pub fn normalize_sample(sample: &mut Value) -> LabelResult<Transfer> {
    let found = json_type(sample);
    let Some(record) = sample.as_object_mut() else {
        return Err(LabelError::NotAnObject(found));
    };

    let mut transfer = Transfer::new();
    Target::Sample(record).normalize(&mut transfer)?;

    trace!(buffers = transfer.len(), "normalized sample");
    Ok(transfer)
}

/// Normalize a batch of per-frame records.
///
/// # Errors
///
/// See [`normalize`]; the reported field is prefixed with `frames[i]`.
pub fn normalize_frames(frames: &mut [Value]) -> LabelResult<Transfer> {
    let mut transfer = Transfer::new();
    Target::Frames(frames).normalize(&mut transfer)?;
    Ok(transfer)
}

/// Callback for one encoded field: the label object and the field name.
type FieldFn<'a> = dyn FnMut(&mut Map<String, Value>, &'static str) -> Result<(), DecodeError> + 'a;

enum Target<'a> {
    Record(&'a mut Map<String, Value>),
    Sample(&'a mut Map<String, Value>),
    Frames(&'a mut [Value]),
}

impl Target<'_> {
    /// Decode every encoded field, then attach the buffers and rewrite ids.
    fn normalize(&mut self, transfer: &mut Transfer) -> LabelResult<()> {
        let mut decoded = Vec::new();
        self.visit(&mut |label, field| {
            if let Some(Value::String(text)) = label.get(field) {
                decoded.push(lookout_codec::decode(text)?);
            }
            Ok(())
        })?;

        // Same traversal as above, so fields and arrays line up.
        let mut decoded = decoded.into_iter();
        self.visit(&mut |label, field| {
            if let Some(array) = decoded.next() {
                trace!(field, shape = ?array.shape(), "decoded array");
                let reference = transfer.push(array);
                label.insert(field.to_string(), reference.to_value());
            }
            Ok(())
        })?;

        self.rewrite_ids();
        Ok(())
    }

    fn visit(&mut self, f: &mut FieldFn<'_>) -> LabelResult<()> {
        match self {
            Self::Record(record) => visit_record(record, f),
            Self::Sample(record) => {
                visit_record(record, f)?;
                match record.get_mut(FRAMES_FIELD).and_then(Value::as_array_mut) {
                    Some(frames) => visit_frames(frames, f),
                    None => Ok(()),
                }
            }
            Self::Frames(frames) => visit_frames(frames, f),
        }
    }

    fn rewrite_ids(&mut self) {
        match self {
            Self::Record(record) => rewrite_record(record),
            Self::Sample(record) => {
                rewrite_record(record);
                if let Some(frames) = record.get_mut(FRAMES_FIELD).and_then(Value::as_array_mut) {
                    frames
                        .iter_mut()
                        .filter_map(Value::as_object_mut)
                        .for_each(rewrite_record);
                }
            }
            Self::Frames(frames) => frames
                .iter_mut()
                .filter_map(Value::as_object_mut)
                .for_each(rewrite_record),
        }
    }
}

/// Call `f` on every field holding encoded text, in a fixed order.
fn visit_record(record: &mut Map<String, Value>, f: &mut FieldFn<'_>) -> LabelResult<()> {
    for (name, value) in record.iter_mut() {
        let Some(label) = value.as_object_mut() else {
            continue;
        };
        let Some(kind) = LabelKind::of(label) else {
            continue;
        };
        let Some(field) = kind.array_field() else {
            continue;
        };

        let Some(list) = kind.list_field() else {
            if is_encoded(label, field) {
                f(label, field).map_err(|e| LabelError::decode(format!("{name}.{field}"), e))?;
            }
            continue;
        };

        let Some(items) = label.get_mut(list).and_then(Value::as_array_mut) else {
            continue;
        };
        for (i, item) in items.iter_mut().enumerate() {
            if let Some(item) = item.as_object_mut()
                && is_encoded(item, field)
            {
                f(item, field)
                    .map_err(|e| LabelError::decode(format!("{name}.{list}[{i}].{field}"), e))?;
            }
        }
    }
    Ok(())
}

fn visit_frames(frames: &mut [Value], f: &mut FieldFn<'_>) -> LabelResult<()> {
    for (i, frame) in frames.iter_mut().enumerate() {
        let Some(record) = frame.as_object_mut() else {
            continue;
        };
        visit_record(record, f).map_err(|err| match err {
            LabelError::Decode { field, source } => {
                LabelError::decode(format!("{FRAMES_FIELD}[{i}].{field}"), source)
            }
            other => other,
        })?;
    }
    Ok(())
}

// Anything but non-empty text is either absent or already native.
fn is_encoded(label: &Map<String, Value>, field: &str) -> bool {
    matches!(label.get(field), Some(Value::String(text)) if !text.is_empty())
}

fn rewrite_record(record: &mut Map<String, Value>) {
    rewrite_id(record);
    for value in record.values_mut() {
        let Some(label) = value.as_object_mut() else {
            continue;
        };
        if let Some(kind) = LabelKind::of(label) {
            rewrite_ids(kind, label);
        }
    }
}

fn rewrite_ids(kind: LabelKind, label: &mut Map<String, Value>) {
    match kind.list_field() {
        Some(list) => {
            if let Some(items) = label.get_mut(list).and_then(Value::as_array_mut) {
                items
                    .iter_mut()
                    .filter_map(Value::as_object_mut)
                    .for_each(rewrite_id);
            }
        }
        None => rewrite_id(label),
    }
}

fn rewrite_id(object: &mut Map<String, Value>) {
    if let Some(id) = object.remove(INTERNAL_ID_FIELD) {
        object.insert(ID_FIELD.to_string(), id);
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
