//! Metadata properties: decoding of `jack_description_t` records and the
//! get/set/remove facade, including client and port shortcuts.

use crate::client::{Api, ClientHandle};
use crate::encoding::TextEncoding;
use crate::flags::keys;
use crate::types::{JackDescription, JackProperty, Uuid};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::{CStr, CString, c_char, c_int};
use std::ptr;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            PropertyValue::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PropertyValue::Text(text) => text.as_bytes(),
            PropertyValue::Bytes(bytes) => bytes,
        }
    }

    fn encode(&self, encoding: TextEncoding) -> Option<CString> {
        match self {
            PropertyValue::Text(text) => encoding.encode(text).ok(),
            PropertyValue::Bytes(bytes) => CString::new(bytes.clone()).ok(),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(text: &str) -> Self {
        PropertyValue::Text(text.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(text: String) -> Self {
        PropertyValue::Text(text)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(bytes: Vec<u8>) -> Self {
        PropertyValue::Bytes(bytes)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PropertyRecord {
    pub subject: Uuid,
    pub key: String,
    pub value: PropertyValue,
    pub mime_type: Option<String>,
}

/// Values are text only under a `text/` MIME type.
pub fn is_text_mime(mime_type: Option<&str>) -> bool {
    mime_type.is_some_and(|mime| mime.starts_with("text/"))
}

/// Decodes a raw property value. Text that does not decode under
/// `encoding` is kept as bytes.
pub fn decode_value(bytes: &[u8], mime_type: Option<&str>, encoding: TextEncoding) -> PropertyValue {
    if is_text_mime(mime_type)
        && let Some(text) = encoding.decode(bytes)
    {
        return PropertyValue::Text(text);
    }
    PropertyValue::Bytes(bytes.to_vec())
}

unsafe fn bytes<'a>(ptr: *const c_char) -> &'a [u8] {
    if ptr.is_null() {
        &[]
    } else {
        // SAFETY: libjack stores NUL-terminated strings in properties.
        unsafe { CStr::from_ptr(ptr) }.to_bytes()
    }
}

/// # Safety
/// The strings of `property` must be null or NUL-terminated.
unsafe fn decode_property(subject: Uuid, property: &JackProperty, encoding: TextEncoding) -> PropertyRecord {
    // SAFETY: forwarded from the caller.
    let mime_type = unsafe { encoding.read(property.mime_type) };
    // SAFETY: forwarded from the caller.
    let (key, value) = unsafe { (bytes(property.key), bytes(property.data)) };
    PropertyRecord {
        subject,
        key: encoding.decode_lossy(key).into_owned(),
        value: decode_value(value, mime_type.as_deref(), encoding),
        mime_type,
    }
}

/// Decodes the properties of one description in native order.
///
/// # Safety
/// `description` must have been filled in by libjack.
pub(crate) unsafe fn decode_description(description: &JackDescription, encoding: TextEncoding) -> Vec<PropertyRecord> {
    if description.properties.is_null() || description.property_cnt == 0 {
        return Vec::new();
    }
    // SAFETY: libjack stores `property_cnt` contiguous properties.
    let properties =
        unsafe { std::slice::from_raw_parts(description.properties, description.property_cnt as usize) };
    properties
        .iter()
        // SAFETY: property strings come from libjack.
        .map(|property| unsafe { decode_property(description.subject, property, encoding) })
        .collect()
}

impl Api {
    /// `jack_free_description` with `free_description_itself = 0`.
    fn free_description(&self, description: &mut JackDescription) {
        native_call!(self, jack_free_description(description, 0), ())
    }

    pub fn get_property(&self, subject: Uuid, key: &str) -> Option<PropertyRecord> {
        self.get_property_encoded(subject, key, self.encoding())
    }

    /// `jack_get_property`; the returned value and type strings are
    /// released with `jack_free`.
    pub fn get_property_encoded(&self, subject: Uuid, key: &str, encoding: TextEncoding) -> Option<PropertyRecord> {
        let native_key = self.encode(key, encoding)?;
        let mut value: *mut c_char = ptr::null_mut();
        let mut mime: *mut c_char = ptr::null_mut();
        let status = native_call!(
            self,
            jack_get_property(subject, native_key.as_ptr(), &mut value, &mut mime),
            return None
        );
        if status != 0 {
            return None;
        }
        // SAFETY: both strings were allocated by libjack for the caller.
        let raw_value = unsafe { bytes(value) }.to_vec();
        let mime_type = self.take(mime, encoding);
        if !value.is_null() {
            // SAFETY: see above.
            unsafe { self.free(value.cast()) };
        }
        Some(PropertyRecord {
            subject,
            key: key.to_string(),
            value: decode_value(&raw_value, mime_type.as_deref(), encoding),
            mime_type,
        })
    }

    pub fn get_properties(&self, subject: Uuid) -> Vec<PropertyRecord> {
        self.get_properties_encoded(subject, self.encoding())
    }

    /// `jack_get_properties`. The description is released exactly once,
    /// also when it holds no properties.
    pub fn get_properties_encoded(&self, subject: Uuid, encoding: TextEncoding) -> Vec<PropertyRecord> {
        let mut description = JackDescription::default();
        let count = native_call!(
            self,
            jack_get_properties(subject, &mut description),
            return Vec::new()
        );
        let records = if count < 0 {
            Vec::new()
        } else {
            // SAFETY: libjack filled in `description`.
            unsafe { decode_description(&description, encoding) }
        };
        self.free_description(&mut description);
        records
    }

    pub fn all_properties(&self) -> BTreeMap<Uuid, Vec<PropertyRecord>> {
        self.all_properties_encoded(self.encoding())
    }

    /// `jack_get_all_properties` grouped by subject. Every description is
    /// released with `jack_free_description` and the array with `jack_free`.
    pub fn all_properties_encoded(&self, encoding: TextEncoding) -> BTreeMap<Uuid, Vec<PropertyRecord>> {
        let mut descriptions: *mut JackDescription = ptr::null_mut();
        let count = native_call!(
            self,
            jack_get_all_properties(&mut descriptions),
            return BTreeMap::new()
        );
        let mut grouped = BTreeMap::new();
        if descriptions.is_null() {
            return grouped;
        }
        let count = usize::try_from(count).unwrap_or(0);
        for index in 0..count {
            // SAFETY: libjack returned `count` contiguous descriptions.
            let description = unsafe { &mut *descriptions.add(index) };
            // SAFETY: see above.
            let records = unsafe { decode_description(description, encoding) };
            if !records.is_empty() {
                grouped
                    .entry(description.subject)
                    .or_insert_with(Vec::new)
                    .extend(records);
            }
            self.free_description(description);
        }
        // SAFETY: the array itself was allocated by libjack for the caller.
        unsafe { self.free(descriptions.cast()) };
        grouped
    }

    /// Metadata subject of a client, looked up by name.
    pub fn client_subject(&self, client: ClientHandle, client_name: &str) -> Option<Uuid> {
        let uuid = self.get_uuid_for_client_name(client, client_name)?;
        self.uuid_parse(&uuid)
    }

    /// Metadata subject of a port, looked up by full name.
    pub fn port_subject(&self, client: ClientHandle, port_name: &str) -> Option<Uuid> {
        let port = self.port_by_name(client, port_name)?;
        self.port_uuid(port)
    }

    pub fn client_properties(&self, client: ClientHandle, client_name: &str) -> Vec<PropertyRecord> {
        self.client_subject(client, client_name)
            .map(|subject| self.get_properties(subject))
            .unwrap_or_default()
    }

    pub fn client_property(&self, client: ClientHandle, client_name: &str, key: &str) -> Option<PropertyRecord> {
        let subject = self.client_subject(client, client_name)?;
        self.get_property(subject, key)
    }

    pub fn port_properties(&self, client: ClientHandle, port_name: &str) -> Vec<PropertyRecord> {
        self.port_subject(client, port_name)
            .map(|subject| self.get_properties(subject))
            .unwrap_or_default()
    }

    pub fn port_property(&self, client: ClientHandle, port_name: &str, key: &str) -> Option<PropertyRecord> {
        let subject = self.port_subject(client, port_name)?;
        self.get_property(subject, key)
    }

    pub fn port_pretty_name(&self, client: ClientHandle, port_name: &str) -> Option<String> {
        let record = self.port_property(client, port_name, keys::PRETTY_NAME)?;
        match record.value {
            PropertyValue::Text(text) => Some(text),
            PropertyValue::Bytes(bytes) => Some(self.encoding().decode_lossy(&bytes).into_owned()),
        }
    }

    pub fn set_property(
        &self,
        client: ClientHandle,
        subject: Uuid,
        key: &str,
        value: &PropertyValue,
        mime_type: Option<&str>,
    ) -> c_int {
        self.set_property_encoded(client, subject, key, value, mime_type, self.encoding())
    }

    pub fn set_property_encoded(
        &self,
        client: ClientHandle,
        subject: Uuid,
        key: &str,
        value: &PropertyValue,
        mime_type: Option<&str>,
        encoding: TextEncoding,
    ) -> c_int {
        let Some(key) = self.encode(key, encoding) else {
            return -1;
        };
        let Some(value) = value.encode(encoding) else {
            warn!("property value not passed to libjack");
            return -1;
        };
        let mime_type = match mime_type {
            Some(mime) => match self.encode(mime, encoding) {
                Some(mime) => Some(mime),
                None => return -1,
            },
            None => None,
        };
        native_call!(
            self,
            jack_set_property(
                client.as_ptr(),
                subject,
                key.as_ptr(),
                value.as_ptr(),
                mime_type.as_ref().map_or(ptr::null(), |mime| mime.as_ptr()),
            ),
            -1
        )
    }

    pub fn set_client_property(
        &self,
        client: ClientHandle,
        client_name: &str,
        key: &str,
        value: &PropertyValue,
        mime_type: Option<&str>,
    ) -> c_int {
        match self.client_subject(client, client_name) {
            Some(subject) => self.set_property(client, subject, key, value, mime_type),
            None => -1,
        }
    }

    pub fn set_port_property(
        &self,
        client: ClientHandle,
        port_name: &str,
        key: &str,
        value: &PropertyValue,
        mime_type: Option<&str>,
    ) -> c_int {
        match self.port_subject(client, port_name) {
            Some(subject) => self.set_property(client, subject, key, value, mime_type),
            None => -1,
        }
    }

    pub fn set_port_pretty_name(&self, client: ClientHandle, port_name: &str, pretty_name: &str) -> c_int {
        self.set_port_property(
            client,
            port_name,
            keys::PRETTY_NAME,
            &PropertyValue::from(pretty_name),
            Some("text/plain"),
        )
    }

    pub fn remove_property(&self, client: ClientHandle, subject: Uuid, key: &str) -> c_int {
        let Some(key) = self.encode(key, self.encoding()) else {
            return -1;
        };
        native_call!(
            self,
            jack_remove_property(client.as_ptr(), subject, key.as_ptr()),
            -1
        )
    }

    /// Removes every property of `subject`; returns the number removed.
    pub fn remove_properties(&self, client: ClientHandle, subject: Uuid) -> c_int {
        native_call!(self, jack_remove_properties(client.as_ptr(), subject), -1)
    }

    pub fn remove_all_properties(&self, client: ClientHandle) -> c_int {
        native_call!(self, jack_remove_all_properties(client.as_ptr()), -1)
    }

    pub fn remove_client_property(&self, client: ClientHandle, client_name: &str, key: &str) -> c_int {
        match self.client_subject(client, client_name) {
            Some(subject) => self.remove_property(client, subject, key),
            None => -1,
        }
    }

    pub fn remove_client_properties(&self, client: ClientHandle, client_name: &str) -> c_int {
        match self.client_subject(client, client_name) {
            Some(subject) => self.remove_properties(client, subject),
            None => -1,
        }
    }

    pub fn remove_port_property(&self, client: ClientHandle, port_name: &str, key: &str) -> c_int {
        match self.port_subject(client, port_name) {
            Some(subject) => self.remove_property(client, subject, key),
            None => -1,
        }
    }

    pub fn remove_port_properties(&self, client: ClientHandle, port_name: &str) -> c_int {
        match self.port_subject(client, port_name) {
            Some(subject) => self.remove_properties(client, subject),
            None => -1,
        }
    }
}
