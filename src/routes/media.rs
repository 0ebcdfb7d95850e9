use crate::{error::AppError, state::AppState};
use actix_web::{get, post, web, HttpResponse};

/// POST /api/v1/media
///
/// Attachment upload: raw request body in, backend-assigned CID out. The
/// size ceiling is enforced before any upload attempt. (The server-wide
/// actix payload limit is configured above this ceiling in main.)
#[post("/api/v1/media")]
pub async fn upload_media(
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("empty upload".into()));
    }
    let limit = state.config.max_upload_bytes;
    if body.len() > limit {
        return Err(AppError::PayloadTooLarge { limit });
    }

    let stored = state.content.upload("attachment", body.to_vec()).await?;
    let gateway_url = format!("{}/ipfs/{}", state.config.ipfs_gateway_url, stored.cid);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "cid": stored.cid,
        "size": stored.size,
        "gateway_url": gateway_url,
    })))
}

/// GET /api/v1/media/{cid}
///
/// Proxies attachment bytes from the gateway. Content under a CID is
/// immutable, hence the aggressive cache header.
#[get("/api/v1/media/{cid}")]
pub async fn get_media(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let cid = path.into_inner();
    let (bytes, content_type) = state.content.fetch(&cid).await?;

    Ok(HttpResponse::Ok()
        .insert_header((
            "Content-Type",
            content_type.unwrap_or_else(|| "application/octet-stream".into()),
        ))
        .insert_header(("Cache-Control", "public, max-age=31536000, immutable"))
        .body(bytes))
}
