use anyhow::Context;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::AppState;

/// Persist picture bytes to the object store and return the generated key.
/// Writing the key onto the user record is the caller's separate step.
pub async fn store_profile_picture(
    st: &AppState,
    user_id: Uuid,
    file_name: Option<&str>,
    content_type: &str,
    body: Bytes,
) -> anyhow::Result<String> {
    let key = picture_key(user_id, file_name, content_type);
    st.storage
        .put_object(&key, body, content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(key)
}

/// Millisecond-timestamp prefix keeps keys collision-free even for repeated
/// uploads of the same file name.
fn picture_key(user_id: Uuid, file_name: Option<&str>, content_type: &str) -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let name = file_name
        .map(sanitize_file_name)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| {
            format!("picture.{}", ext_from_mime(content_type).unwrap_or("bin"))
        });
    format!("profiles/{}/{}-{}", user_id, millis, name)
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}
