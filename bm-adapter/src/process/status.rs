//! Delivery status callback translation.
//!
//! Blackmyna reports delivery with Kannel-style DLR codes. The mapping is a
//! closed enum: a code we have not seen is rejected, never guessed.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::backend::Backend;
use crate::channel::Channel;
use crate::error::AdapterError;
use crate::queue::{MessageStatus, StatusValue};
use crate::web::form::{validate_form, FieldRule};

/// Fields Blackmyna sends with every status callback.
pub const STATUS_FIELDS: &[FieldRule] = &[FieldRule::required("id"), FieldRule::required_int("status")];

/// Vendor delivery report codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorStatusCode {
    Delivered = 1,
    Undelivered = 2,
    SmscSubmit = 8,
    SmscReject = 16,
}

impl VendorStatusCode {
    pub const ALL: [VendorStatusCode; 4] = [
        VendorStatusCode::Delivered,
        VendorStatusCode::Undelivered,
        VendorStatusCode::SmscSubmit,
        VendorStatusCode::SmscReject,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn canonical(self) -> StatusValue {
        match self {
            VendorStatusCode::Delivered => StatusValue::Delivered,
            VendorStatusCode::Undelivered => StatusValue::Failed,
            VendorStatusCode::SmscSubmit => StatusValue::Sent,
            VendorStatusCode::SmscReject => StatusValue::Failed,
        }
    }
}

impl TryFrom<i64> for VendorStatusCode {
    type Error = AdapterError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(VendorStatusCode::Delivered),
            2 => Ok(VendorStatusCode::Undelivered),
            8 => Ok(VendorStatusCode::SmscSubmit),
            16 => Ok(VendorStatusCode::SmscReject),
            _ => Err(AdapterError::UnknownStatus { value }),
        }
    }
}

/// Turn a status callback form into a [`MessageStatus`] keyed by the vendor id
/// and write it.
///
/// Unknown codes are rejected and logged without writing anything.
pub async fn receive_status(
    backend: &dyn Backend,
    channel: &Channel,
    form: &HashMap<String, String>,
) -> Result<MessageStatus, AdapterError> {
    let fields = validate_form(form, STATUS_FIELDS)?;
    let external_id = fields.str("id").trim();
    let code = fields.int("status");

    let vendor_status = match VendorStatusCode::try_from(code) {
        Ok(s) => s,
        Err(e) => {
            warn!(
                channel_uuid = %channel.uuid,
                external_id = external_id,
                status_code = code,
                "bm_status_unknown"
            );
            return Err(e);
        }
    };

    let status = backend.new_status_for_external_id(channel, external_id, vendor_status.canonical());
    backend.write_status(&status).await?;

    info!(
        channel_uuid = %channel.uuid,
        external_id = external_id,
        status_code = code,
        status = %status.status(),
        "bm_status_received"
    );

    Ok(status)
}
