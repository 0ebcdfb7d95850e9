use crate::{
    error::AppError,
    feed::cid_from_entry_name,
    models::post::{NewPost, Post},
    state::AppState,
};
use actix_web::{get, post, web, HttpResponse};

/// POST /api/v1/posts
///
/// Ingress: upload the canonical post (assigning its CID), append it to the
/// durable log, broadcast it, and warm the local cache. Only the log write
/// is fatal to the request; broadcast failure degrades delivery latency,
/// not durability.
#[post("/api/v1/posts")]
pub async fn create_post(
    state: web::Data<AppState>,
    body: web::Json<NewPost>,
) -> Result<HttpResponse, AppError> {
    let draft = body.into_inner().into_draft()?;
    let canonical = draft.canonical_json()?;
    let stored = state
        .content
        .upload("post.json", canonical.into_bytes())
        .await?;
    let post = draft.into_post(stored.cid);

    state.log.append(&post.channel, &post).await?;

    let payload = post.to_json()?;
    if let Err(e) = state.pubsub.publish(&post.channel, payload.as_bytes()).await {
        tracing::warn!(channel=%post.channel, cid=%post.cid, error=%e,
            "pub/sub publish failed; readers will pick the post up by polling");
    }

    state.store.add(post.clone());

    Ok(HttpResponse::Created().json(post))
}

/// GET /api/v1/channels/{channel}/posts
///
/// History: the durable log is the source of truth; when it is unreachable
/// this degrades to whatever the local cache holds, never to an error.
#[get("/api/v1/channels/{channel}/posts")]
pub async fn get_channel_posts(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let channel = path.into_inner();

    let names = match state.log.list(&channel).await {
        Ok(names) => names,
        Err(AppError::BackendUnreachable(e)) => {
            tracing::warn!(%channel, error=%e, "log unreachable; serving cached history");
            return Ok(HttpResponse::Ok().json(state.store.get_by_channel(&channel)));
        }
        Err(e) => return Err(e),
    };

    let cap = state.config.channel_cap;
    let tail_start = names.len().saturating_sub(cap);
    let mut posts: Vec<Post> = Vec::with_capacity(names.len() - tail_start);
    for name in &names[tail_start..] {
        let Some(cid) = cid_from_entry_name(name) else {
            continue;
        };
        // Warm posts skip the backend round trip.
        if let Some(post) = state.store.get(cid) {
            posts.push(post);
            continue;
        }
        match state.log.read(&channel, name).await {
            Ok(bytes) => match Post::from_json(&bytes) {
                Ok(post) => posts.push(post),
                Err(e) => {
                    tracing::warn!(%channel, entry=%name, error=%e, "skipping unparseable log entry");
                }
            },
            Err(e) => {
                tracing::warn!(%channel, entry=%name, error=%e, "skipping unreadable log entry");
            }
        }
    }

    Ok(HttpResponse::Ok().json(posts))
}
