//! Version `1.0` Storage Analytics log records.

use crate::error::{Error, Result};
use crate::reader::DelimitedRecordReader;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncBufRead;
use url::Url;
use uuid::Uuid;

/// The only log schema version this crate understands.
pub const SUPPORTED_VERSION: &str = "1.0";

/// Format of the request start time, e.g. `2011-08-09T21:44:38.2364384Z`.
pub const REQUEST_START_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// Format of the last modified time, e.g. `Tuesday, 09-Aug-11 21:44:38 GMT`.
///
/// Two-digit years use chrono's fixed pivot: `00`-`69` read as 2000-2069 and
/// `70`-`99` as 1970-1999.
pub const LAST_MODIFIED_TIME_FORMAT: &str = "%A, %d-%b-%y %H:%M:%S GMT";

/// One logged storage request.
///
/// Every field is optional: the service writes an empty field when a value
/// does not apply to the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub version_number: String,
    pub request_start_time: Option<DateTime<Utc>>,
    pub operation_type: Option<String>,
    pub request_status: Option<String>,
    pub http_status_code: Option<String>,
    pub end_to_end_latency_ms: Option<i32>,
    pub server_latency_ms: Option<i32>,
    pub authentication_type: Option<String>,
    pub requester_account_name: Option<String>,
    pub owner_account_name: Option<String>,
    pub service_type: Option<String>,
    pub request_url: Option<Url>,
    pub requested_object_key: Option<String>,
    pub request_id: Option<Uuid>,
    pub operation_count: Option<i32>,
    pub requester_ip_address: Option<String>,
    pub request_version_header: Option<String>,
    pub request_header_size: Option<i64>,
    pub request_packet_size: Option<i64>,
    pub response_header_size: Option<i64>,
    pub response_packet_size: Option<i64>,
    pub request_content_length: Option<i64>,
    pub request_md5: Option<String>,
    pub server_md5: Option<String>,
    pub etag_identifier: Option<String>,
    pub last_modified_time: Option<DateTime<Utc>>,
    pub conditions_used: Option<String>,
    pub user_agent_header: Option<String>,
    pub referrer_header: Option<String>,
    pub client_request_id: Option<String>,
}

impl LogRecord {
    /// Read exactly one record, including its record delimiter.
    ///
    /// The version field is checked before anything else is read.
    pub async fn read<R>(reader: &mut DelimitedRecordReader<R>) -> Result<Self>
    where
        R: AsyncBufRead + Unpin,
    {
        let version_number = match reader.read_string().await? {
            Some(version) if version == SUPPORTED_VERSION => version,
            other => return Err(Error::UnsupportedVersion(other.unwrap_or_default())),
        };

        let record = LogRecord {
            version_number,
            request_start_time: reader.read_date(REQUEST_START_TIME_FORMAT).await?,
            operation_type: reader.read_string().await?,
            request_status: reader.read_string().await?,
            http_status_code: reader.read_string().await?,
            end_to_end_latency_ms: reader.read_i32().await?,
            server_latency_ms: reader.read_i32().await?,
            authentication_type: reader.read_string().await?,
            requester_account_name: reader.read_string().await?,
            owner_account_name: reader.read_string().await?,
            service_type: reader.read_string().await?,
            request_url: reader.read_uri().await?,
            requested_object_key: reader.read_quoted_string().await?,
            request_id: reader.read_uuid().await?,
            operation_count: reader.read_i32().await?,
            requester_ip_address: reader.read_string().await?,
            request_version_header: reader.read_string().await?,
            request_header_size: reader.read_i64().await?,
            request_packet_size: reader.read_i64().await?,
            response_header_size: reader.read_i64().await?,
            response_packet_size: reader.read_i64().await?,
            request_content_length: reader.read_i64().await?,
            request_md5: reader.read_quoted_string().await?,
            server_md5: reader.read_quoted_string().await?,
            etag_identifier: reader.read_quoted_string().await?,
            last_modified_time: reader.read_date(LAST_MODIFIED_TIME_FORMAT).await?,
            conditions_used: reader.read_quoted_string().await?,
            user_agent_header: reader.read_quoted_string().await?,
            referrer_header: reader.read_quoted_string().await?,
            client_request_id: reader.read_quoted_string().await?,
        };

        reader.end_current_record().await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PUT_BLOB: &str = concat!(
        "1.0;2011-08-09T21:44:38.2364384Z;PutBlob;Success;201;14;13;authenticated;",
        "myaccount;myaccount;blob;",
        "\"https://myaccount.blob.core.windows.net/thumbnails/lake.jpg?timeout=30000&amp;comp=block\";",
        "\"/myaccount/thumbnails/lake;1.jpg\";fb658ee6-6123-41f5-81e2-4bfdc178fea3;0;",
        "201.9.10.20:53094;2009-09-19;438;100;223;0;100;;\"XN7kAUHeUcNHQALG3ylhXw==\";",
        "\"0x8CE1B6EA95033D5\";Tuesday, 09-Aug-11 21:44:38 GMT;;",
        "\"Microsoft Azure Storage Client\";;\"\"\n",
    );

    #[tokio::test]
    async fn test_read_full_record() {
        let mut reader = DelimitedRecordReader::new(PUT_BLOB.as_bytes());
        let record = LogRecord::read(&mut reader).await.unwrap();

        assert_eq!(record.version_number, "1.0");
        let start = record.request_start_time.unwrap();
        assert_eq!(start.timestamp(), 1_312_926_278);
        assert_eq!(start.timestamp_subsec_nanos(), 236_438_400);
        assert_eq!(record.operation_type.as_deref(), Some("PutBlob"));
        assert_eq!(record.request_status.as_deref(), Some("Success"));
        assert_eq!(record.http_status_code.as_deref(), Some("201"));
        assert_eq!(record.end_to_end_latency_ms, Some(14));
        assert_eq!(record.server_latency_ms, Some(13));
        assert_eq!(record.authentication_type.as_deref(), Some("authenticated"));
        assert_eq!(record.requester_account_name.as_deref(), Some("myaccount"));
        assert_eq!(record.owner_account_name.as_deref(), Some("myaccount"));
        assert_eq!(record.service_type.as_deref(), Some("blob"));
        assert_eq!(
            record.request_url.as_ref().map(Url::as_str),
            Some("https://myaccount.blob.core.windows.net/thumbnails/lake.jpg?timeout=30000&comp=block")
        );
        assert_eq!(
            record.requested_object_key.as_deref(),
            Some("/myaccount/thumbnails/lake;1.jpg")
        );
        assert_eq!(
            record.request_id,
            Some(Uuid::parse_str("fb658ee6-6123-41f5-81e2-4bfdc178fea3").unwrap())
        );
        assert_eq!(record.operation_count, Some(0));
        assert_eq!(record.requester_ip_address.as_deref(), Some("201.9.10.20:53094"));
        assert_eq!(record.request_version_header.as_deref(), Some("2009-09-19"));
        assert_eq!(record.request_header_size, Some(438));
        assert_eq!(record.request_packet_size, Some(100));
        assert_eq!(record.response_header_size, Some(223));
        assert_eq!(record.response_packet_size, Some(0));
        assert_eq!(record.request_content_length, Some(100));
        assert_eq!(record.request_md5, None);
        assert_eq!(record.server_md5.as_deref(), Some("XN7kAUHeUcNHQALG3ylhXw=="));
        assert_eq!(record.etag_identifier.as_deref(), Some("0x8CE1B6EA95033D5"));
        assert_eq!(
            record.last_modified_time,
            Some(Utc.with_ymd_and_hms(2011, 8, 9, 21, 44, 38).unwrap())
        );
        assert_eq!(record.conditions_used, None);
        assert_eq!(
            record.user_agent_header.as_deref(),
            Some("Microsoft Azure Storage Client")
        );
        assert_eq!(record.referrer_header, None);
        assert_eq!(record.client_request_id.as_deref(), Some(""));

        assert!(reader.is_end_of_file().await.unwrap());
    }

    #[tokio::test]
    async fn test_records_are_read_in_sequence() {
        let input = format!("{PUT_BLOB}{PUT_BLOB}");
        let mut reader = DelimitedRecordReader::new(input.as_bytes());
        let first = LogRecord::read(&mut reader).await.unwrap();
        assert!(!reader.is_end_of_file().await.unwrap());
        let second = LogRecord::read(&mut reader).await.unwrap();
        assert_eq!(first, second);
        assert!(reader.is_end_of_file().await.unwrap());
    }

    #[tokio::test]
    async fn test_unsupported_version_stops_before_other_fields() {
        let mut reader = DelimitedRecordReader::new("2.0;\"unterminated\n".as_bytes());
        let err = LogRecord::read(&mut reader).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(ref v) if v == "2.0"));
        assert!(reader.has_more_fields_in_record().await.unwrap());
    }

    #[tokio::test]
    async fn test_truncated_record_is_format_error() {
        let truncated = &PUT_BLOB[..PUT_BLOB.len() - 10];
        let mut reader = DelimitedRecordReader::new(truncated.as_bytes());
        let err = LogRecord::read(&mut reader).await.unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[tokio::test]
    async fn test_last_modified_two_digit_year_pivot() {
        let mut reader = DelimitedRecordReader::new(
            "Tuesday, 31-Dec-69 23:59:59 GMT;Thursday, 01-Jan-70 00:00:00 GMT\n".as_bytes(),
        );
        assert_eq!(
            reader.read_date(LAST_MODIFIED_TIME_FORMAT).await.unwrap(),
            Some(Utc.with_ymd_and_hms(2069, 12, 31, 23, 59, 59).unwrap())
        );
        assert_eq!(
            reader.read_date(LAST_MODIFIED_TIME_FORMAT).await.unwrap(),
            Some(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_record_serializes_to_json() {
        let mut reader = DelimitedRecordReader::new(PUT_BLOB.as_bytes());
        let record = LogRecord::read(&mut reader).await.unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["operation_type"], "PutBlob");
        assert_eq!(json["request_md5"], serde_json::Value::Null);
        assert_eq!(json["request_id"], "fb658ee6-6123-41f5-81e2-4bfdc178fea3");
    }
}
