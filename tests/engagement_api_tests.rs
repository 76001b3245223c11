mod common;

use axum::http::StatusCode;
use common::{Account, TestApp, spawn_app, uuid_of};
use serde_json::{Value, json};
use uuid::Uuid;

struct Scene {
    app: TestApp,
    author: Account,
    admin: Account,
    reader: Account,
    blog: Uuid,
}

async fn scene() -> Scene {
    let app = spawn_app();
    let author = app.author("Ada", "ada@example.com").await;
    let admin = app.admin("Root", "root@example.com").await;
    let reader = app.signup("Reader", "reader@example.com").await;
    let blog = app.published(&author, &admin, "Threads and likes").await;
    Scene {
        app,
        author,
        admin,
        reader,
        blog,
    }
}

async fn comment(app: &TestApp, who: &Account, blog: Uuid, body: Value) -> Value {
    let response = app
        .post(&format!("/blogs/{blog}/comments"), Some(&who.access), body)
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.data().clone()
}

// --- Comments ---

#[tokio::test]
async fn commenting_requires_authentication_and_a_published_post() {
    let s = scene().await;

    let anon = s
        .app
        .post(&format!("/blogs/{}/comments", s.blog), None, json!({ "content": "hi" }))
        .await;
    assert_eq!(anon.status, StatusCode::UNAUTHORIZED);

    let draft = s.app.draft(&s.author, "Not yet live").await;
    let response = s
        .app
        .post(
            &format!("/blogs/{draft}/comments"),
            Some(&s.reader.access),
            json!({ "content": "early bird" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let blank = s
        .app
        .post(
            &format!("/blogs/{}/comments", s.blog),
            Some(&s.reader.access),
            json!({ "content": "   " }),
        )
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn replies_to_replies_are_flattened_with_a_mention() {
    let s = scene().await;
    let root = comment(&s.app, &s.author, s.blog, json!({ "content": "Root" })).await;
    let root_id = uuid_of(&root["id"]);

    let reply = comment(
        &s.app,
        &s.reader,
        s.blog,
        json!({ "content": "First reply", "parent_id": root_id }),
    )
    .await;
    assert_eq!(uuid_of(&reply["parent_id"]), root_id);
    assert!(reply["mentioned_user_id"].is_null());

    let nested = comment(
        &s.app,
        &s.author,
        s.blog,
        json!({ "content": "Answering the reply", "parent_id": reply["id"] }),
    )
    .await;
    assert_eq!(uuid_of(&nested["parent_id"]), root_id);
    assert_eq!(uuid_of(&nested["mentioned_user_id"]), s.reader.id);

    // Answering yourself does not mention yourself.
    let own = comment(
        &s.app,
        &s.author,
        s.blog,
        json!({ "content": "And a follow-up", "parent_id": nested["id"] }),
    )
    .await;
    assert_eq!(uuid_of(&own["parent_id"]), root_id);
    assert!(own["mentioned_user_id"].is_null());

    let listing = s.app.get(&format!("/blogs/{}/comments", s.blog), None).await;
    assert_eq!(listing.status, StatusCode::OK);
    let threads = listing.data()["items"].as_array().unwrap();
    assert_eq!(threads.len(), 1);
    let replies = threads[0]["replies"].as_array().unwrap();
    let bodies: Vec<&str> = replies.iter().map(|r| r["content"].as_str().unwrap()).collect();
    assert_eq!(bodies, ["First reply", "Answering the reply", "And a follow-up"]);
    assert_eq!(replies[1]["mentioned_user_name"], "Reader");
}

#[tokio::test]
async fn roots_are_listed_newest_first() {
    let s = scene().await;
    comment(&s.app, &s.reader, s.blog, json!({ "content": "older" })).await;
    comment(&s.app, &s.reader, s.blog, json!({ "content": "newer" })).await;

    let listing = s.app.get(&format!("/blogs/{}/comments", s.blog), None).await;
    let threads = listing.data()["items"].as_array().unwrap();
    assert_eq!(threads[0]["content"], "newer");
    assert_eq!(threads[1]["content"], "older");
    assert_eq!(listing.data()["total"], 2);
}

#[tokio::test]
async fn parent_must_be_live_and_on_the_same_post() {
    let s = scene().await;
    let other_blog = s.app.published(&s.author, &s.admin, "Another post").await;
    let elsewhere = comment(&s.app, &s.reader, other_blog, json!({ "content": "x" })).await;

    let cross = s
        .app
        .post(
            &format!("/blogs/{}/comments", s.blog),
            Some(&s.reader.access),
            json!({ "content": "cross-post", "parent_id": elsewhere["id"] }),
        )
        .await;
    assert_eq!(cross.status, StatusCode::BAD_REQUEST);

    let root = comment(&s.app, &s.reader, s.blog, json!({ "content": "bye" })).await;
    let root_id = uuid_of(&root["id"]);
    s.app
        .delete(&format!("/comments/{root_id}"), Some(&s.reader.access))
        .await;
    let orphan = s
        .app
        .post(
            &format!("/blogs/{}/comments", s.blog),
            Some(&s.author.access),
            json!({ "content": "too late", "parent_id": root_id }),
        )
        .await;
    assert_eq!(orphan.status, StatusCode::NOT_FOUND);

    let missing = s
        .app
        .post(
            &format!("/blogs/{}/comments", s.blog),
            Some(&s.author.access),
            json!({ "content": "who?", "parent_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleted_roots_with_replies_are_redacted() {
    let s = scene().await;
    let root = comment(&s.app, &s.reader, s.blog, json!({ "content": "regrettable" })).await;
    let root_id = uuid_of(&root["id"]);
    comment(
        &s.app,
        &s.author,
        s.blog,
        json!({ "content": "reply", "parent_id": root_id }),
    )
    .await;
    let lonely = comment(&s.app, &s.reader, s.blog, json!({ "content": "lonely" })).await;

    for id in [root_id, uuid_of(&lonely["id"])] {
        let response = s
            .app
            .delete(&format!("/comments/{id}"), Some(&s.reader.access))
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let listing = s.app.get(&format!("/blogs/{}/comments", s.blog), None).await;
    let threads = listing.data()["items"].as_array().unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0]["content"], "[deleted]");
    assert_eq!(threads[0]["author_name"], "[deleted]");
    assert!(threads[0]["author_avatar_url"].is_null());
    assert_eq!(threads[0]["replies"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn only_the_owner_edits_but_admins_may_delete() {
    let s = scene().await;
    let c = comment(&s.app, &s.reader, s.blog, json!({ "content": "typo" })).await;
    let uri = format!("/comments/{}", c["id"].as_str().unwrap());

    let foreign = s
        .app
        .put(&uri, Some(&s.author.access), json!({ "content": "vandalised" }))
        .await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
    assert_eq!(
        s.app.delete(&uri, Some(&s.author.access)).await.status,
        StatusCode::NOT_FOUND
    );

    let edit = s
        .app
        .put(&uri, Some(&s.reader.access), json!({ "content": "fixed" }))
        .await;
    assert_eq!(edit.status, StatusCode::OK);
    assert_eq!(edit.data()["content"], "fixed");

    assert_eq!(s.app.delete(&uri, Some(&s.admin.access)).await.status, StatusCode::OK);
    assert_eq!(
        s.app.get(&format!("/blogs/{}/comments", s.blog), None).await.data()["total"],
        0
    );
}

// --- Likes ---

#[tokio::test]
async fn likes_toggle_and_count_once_per_reader() {
    let s = scene().await;
    let like_uri = format!("/blogs/{}/like", s.blog);
    let likes_uri = format!("/blogs/{}/likes", s.blog);

    let first = s.app.post(&like_uri, Some(&s.reader.access), json!({})).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.data()["liked"], true);
    assert_eq!(first.data()["like_count"], 1);

    s.app.post(&like_uri, Some(&s.author.access), json!({})).await;

    let mine = s.app.get(&likes_uri, Some(&s.reader.access)).await;
    assert_eq!(mine.data()["liked"], true);
    assert_eq!(mine.data()["like_count"], 2);

    let anonymous = s.app.get(&likes_uri, None).await;
    assert_eq!(anonymous.data()["liked"], false);

    let undo = s.app.post(&like_uri, Some(&s.reader.access), json!({})).await;
    assert_eq!(undo.data()["liked"], false);
    assert_eq!(undo.data()["like_count"], 1);

    let detail = s.app.get(&format!("/blogs/{}", s.blog), Some(&s.author.access)).await;
    assert_eq!(detail.data()["liked_by_me"], true);
    assert_eq!(detail.data()["like_count"], 1);
}

#[tokio::test]
async fn unpublished_posts_cannot_be_liked() {
    let s = scene().await;
    let draft = s.app.draft(&s.author, "Hidden").await;

    let response = s
        .app
        .post(&format!("/blogs/{draft}/like"), Some(&s.reader.access), json!({}))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

// --- Views ---

#[tokio::test]
async fn generic_views_count_every_call() {
    let s = scene().await;
    let uri = format!("/blogs/{}/views", s.blog);

    s.app.post(&uri, None, json!({})).await;
    let second = s.app.post(&uri, None, json!({})).await;

    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.data()["view_count"], 2);
    assert_eq!(second.data()["counted"], true);
}

#[tokio::test]
async fn verified_views_count_once_per_reader() {
    let s = scene().await;
    let uri = format!("/blogs/{}/views/verified", s.blog);

    let anon = s.app.post(&uri, None, json!({})).await;
    assert_eq!(anon.status, StatusCode::UNAUTHORIZED);

    let first = s.app.post(&uri, Some(&s.reader.access), json!({})).await;
    assert_eq!(first.data()["counted"], true);
    assert_eq!(first.data()["verified_view_count"], 1);

    let again = s.app.post(&uri, Some(&s.reader.access), json!({})).await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.data()["counted"], false);
    assert_eq!(again.data()["verified_view_count"], 1);

    let other = s.app.post(&uri, Some(&s.author.access), json!({})).await;
    assert_eq!(other.data()["verified_view_count"], 2);
}
