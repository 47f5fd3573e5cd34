//! Pages the policy gate redirects browsers to

use axum::response::Html;

/// GET /block-img.html
pub async fn blocked() -> Html<&'static str> {
    Html(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Blocked</title></head>\
         <body><h1>This image has been blocked</h1>\
         <p>The file was removed or flagged by moderation.</p></body></html>\n",
    )
}

/// GET /whitelist-on.html
pub async fn whitelist_on() -> Html<&'static str> {
    Html(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Unavailable</title></head>\
         <body><h1>White-list mode is on</h1>\
         <p>Only approved images are served right now.</p></body></html>\n",
    )
}
