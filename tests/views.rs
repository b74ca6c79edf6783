use std::collections::HashMap;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tower::ServiceExt;
use url::form_urlencoded;
use warbler::application::repos::FollowsRepo;
use warbler::infra::db::PostgresRepositories;
use warbler::infra::http::{HttpState, Session, SessionConfig, build_router};

/// A browser stand-in that replays cookies between requests.
struct Client {
    router: Router,
    cookies: HashMap<String, String>,
}

struct Page {
    status: StatusCode,
    location: Option<String>,
    body: String,
}

impl Client {
    fn new(pool: PgPool) -> Self {
        let state = HttpState::new(
            PostgresRepositories::new(pool),
            SessionConfig::new("test secret", "warbler_session", false),
            100,
        );
        Self {
            router: build_router(state),
            cookies: HashMap::new(),
        }
    }

    async fn get(&mut self, uri: &str) -> Page {
        let request = self.request(Method::GET, uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn post(&mut self, uri: &str, fields: &[(&str, &str)]) -> Page {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let request = self
            .request(Method::POST, uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Follow a redirect the way a browser would after a form post.
    async fn follow(&mut self, page: Page) -> Page {
        let location = page.location.expect("response should redirect");
        self.get(&location).await
    }

    fn request(&self, method: Method, uri: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if !self.cookies.is_empty() {
            let header_value = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, header_value);
        }
        builder
    }

    async fn send(&mut self, request: Request<Body>) -> Page {
        let response = self.router.clone().oneshot(request).await.unwrap();
        self.store_cookies(&response);

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|value| value.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        Page {
            status,
            location,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    fn store_cookies(&mut self, response: &Response) {
        for value in response.headers().get_all(header::SET_COOKIE) {
            let raw = value.to_str().unwrap();
            let pair = raw.split(';').next().unwrap_or_default();
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            if value.is_empty() || raw.contains("Max-Age=0") {
                self.cookies.remove(name);
            } else {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
    }

    async fn signup(&mut self, username: &str) -> i64 {
        let email = format!("{username}@example.com");
        let page = self
            .post(
                "/signup",
                &[
                    ("username", username),
                    ("email", &email),
                    ("password", "password"),
                    ("image_url", ""),
                ],
            )
            .await;
        assert_eq!(page.status, StatusCode::SEE_OTHER);
        assert_eq!(page.location.as_deref(), Some("/"));

        let home = self.get("/").await;
        let marker = "<a href=\"/users/";
        let start = home.body.find(marker).expect("nav links to own profile") + marker.len();
        let end = start + home.body[start..].find('"').unwrap();
        home.body[start..end].parse().unwrap()
    }

    async fn post_message(&mut self, text: &str) {
        let page = self.post("/messages/new", &[("text", text)]).await;
        assert_eq!(page.status, StatusCode::SEE_OTHER);
    }
}

fn message_id(body: &str, text: &str) -> i64 {
    let text_at = body.find(text).expect("message text on page");
    let marker = "href=\"/messages/";
    let start = body[..text_at].rfind(marker).expect("message link") + marker.len();
    let end = start + body[start..].find('"').unwrap();
    body[start..end].parse().unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn anonymous_homepage_invites_signup(pool: PgPool) {
    let mut client = Client::new(pool);

    let page = client.get("/").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Sign up"));
    assert!(page.body.contains("Log in"));
}

#[sqlx::test(migrations = "./migrations")]
async fn signup_logs_in_and_shows_timeline(pool: PgPool) {
    let mut client = Client::new(pool);
    client.signup("testuser").await;

    client.post_message("Hello, Warbler").await;
    let home = client.get("/").await;
    assert!(home.body.contains("Hello, Warbler"));
    assert!(home.body.contains("@testuser"));
    assert!(home.body.contains("Log out"));
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_signup_rerenders_with_flash(pool: PgPool) {
    let mut client = Client::new(pool);
    client.signup("taken").await;
    client.get("/logout").await;

    let page = client
        .post(
            "/signup",
            &[
                ("username", "taken"),
                ("email", "someone-else@example.com"),
                ("password", "password"),
            ],
        )
        .await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Username already taken"));
    assert!(page.body.contains("value=\"someone-else@example.com\""));
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_email_rerenders_with_flash(pool: PgPool) {
    let mut client = Client::new(pool);
    client.signup("first").await;
    client.get("/logout").await;

    let page = client
        .post(
            "/signup",
            &[
                ("username", "second"),
                ("email", "first@example.com"),
                ("password", "password"),
            ],
        )
        .await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Email already taken"));
    assert!(!page.body.contains("Username already taken"));
    assert!(page.body.contains("value=\"second\""));

    let home = client.get("/").await;
    assert!(home.body.contains("Sign up now"));
}

#[sqlx::test(migrations = "./migrations")]
async fn login_greets_user_and_logout_says_goodbye(pool: PgPool) {
    let mut client = Client::new(pool);
    client.signup("greeted").await;
    let logout = client.get("/logout").await;
    assert_eq!(logout.location.as_deref(), Some("/login"));
    let login_page = client.follow(logout).await;
    assert!(login_page.body.contains("You successfully logged out!"));

    let page = client
        .post("/login", &[("username", "greeted"), ("password", "password")])
        .await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    let home = client.follow(page).await;
    assert!(home.body.contains("Hello, greeted!"));

    // Flashes are shown once.
    let again = client.get("/").await;
    assert!(!again.body.contains("Hello, greeted!"));
}

#[sqlx::test(migrations = "./migrations")]
async fn bad_login_is_rejected(pool: PgPool) {
    let mut client = Client::new(pool);
    client.signup("careful").await;
    client.get("/logout").await;

    let page = client
        .post("/login", &[("username", "careful"), ("password", "guessing")])
        .await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("Invalid credentials."));
    assert!(!page.body.contains("value=\"guessing\""));
}

#[sqlx::test(migrations = "./migrations")]
async fn posting_while_logged_out_is_unauthorized(pool: PgPool) {
    let mut client = Client::new(pool);

    let page = client.post("/messages/new", &[("text", "sneaky")]).await;
    assert_eq!(page.status, StatusCode::SEE_OTHER);
    assert_eq!(page.location.as_deref(), Some("/"));

    let home = client.follow(page).await;
    assert!(home.body.contains("Access unauthorized."));
    assert!(home.body.contains("Log in"));

    let page = client.post("/messages/1/delete", &[]).await;
    assert_eq!(page.location.as_deref(), Some("/"));
    let home = client.follow(page).await;
    assert!(home.body.contains("Log in"));
}

#[sqlx::test(migrations = "./migrations")]
async fn protected_pages_redirect_anonymous_visitors(pool: PgPool) {
    let mut client = Client::new(pool);
    let owner = client.signup("visible").await;
    client.get("/logout").await;

    for uri in [
        format!("/users/{owner}/following"),
        format!("/users/{owner}/followers"),
        format!("/users/{owner}/likes"),
        "/messages/new".to_string(),
    ] {
        let page = client.get(&uri).await;
        assert_eq!(page.status, StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(page.location.as_deref(), Some("/"), "{uri}");
    }

    let profile = client.get(&format!("/users/{owner}")).await;
    assert_eq!(profile.status, StatusCode::OK);
}

#[sqlx::test(migrations = "./migrations")]
async fn message_too_long_rerenders_form(pool: PgPool) {
    let mut client = Client::new(pool);
    client.signup("verbose").await;

    let text = "x".repeat(141);
    let page = client.post("/messages/new", &[("text", &text)]).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("limited to 140 characters"));
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_another_users_message_is_forbidden(pool: PgPool) {
    let mut alice = Client::new(pool.clone());
    let alice_id = alice.signup("alice").await;
    alice.post_message("alice was here").await;
    let profile = alice.get(&format!("/users/{alice_id}")).await;
    let id = message_id(&profile.body, "alice was here");

    let mut bob = Client::new(pool);
    bob.signup("bob").await;
    let page = bob.post(&format!("/messages/{id}/delete"), &[]).await;
    assert_eq!(page.status, StatusCode::FORBIDDEN);

    let shown = bob.get(&format!("/messages/{id}")).await;
    assert_eq!(shown.status, StatusCode::OK);
    assert!(shown.body.contains("alice was here"));

    let own = alice.post(&format!("/messages/{id}/delete"), &[]).await;
    assert_eq!(own.status, StatusCode::SEE_OTHER);
    let gone = alice.get(&format!("/messages/{id}")).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn profile_stats_link_to_follow_lists(pool: PgPool) {
    let mut first = Client::new(pool.clone());
    let first_id = first.signup("first").await;
    let mut second = Client::new(pool.clone());
    let second_id = second.signup("second").await;

    let followed = second.post(&format!("/users/follow/{first_id}"), &[]).await;
    assert_eq!(
        followed.location,
        Some(format!("/users/{second_id}/following"))
    );

    let repos = PostgresRepositories::new(pool);
    assert!(repos.is_following(second_id, first_id).await.unwrap());

    let profile = first.get(&format!("/users/{first_id}")).await;
    assert!(profile.body.contains(&format!(
        "<p class=\"small\">Followers</p><h4><a href=\"/users/{first_id}/followers\">1</a></h4>"
    )));
    assert!(profile.body.contains(&format!(
        "<p class=\"small\">Following</p><h4><a href=\"/users/{first_id}/following\">0</a></h4>"
    )));

    let followers = first.get(&format!("/users/{first_id}/followers")).await;
    assert!(followers.body.contains("@second"));

    second
        .post(&format!("/users/stop-following/{first_id}"), &[])
        .await;
    let following = second.get(&format!("/users/{second_id}/following")).await;
    assert!(!following.body.contains("@first"));
}

#[sqlx::test(migrations = "./migrations")]
async fn like_toggle_updates_likes_page(pool: PgPool) {
    let mut author = Client::new(pool.clone());
    let author_id = author.signup("author").await;
    author.post_message("worth a like").await;
    let profile = author.get(&format!("/users/{author_id}")).await;
    let id = message_id(&profile.body, "worth a like");

    let mut fan = Client::new(pool);
    let fan_id = fan.signup("fan").await;
    let liked = fan.post(&format!("/users/add_like/{id}"), &[]).await;
    assert_eq!(liked.location.as_deref(), Some("/"));

    let likes = fan.get(&format!("/users/{fan_id}/likes")).await;
    assert!(likes.body.contains("worth a like"));

    fan.post(&format!("/users/add_like/{id}"), &[]).await;
    let likes = fan.get(&format!("/users/{fan_id}/likes")).await;
    assert!(!likes.body.contains("worth a like"));
}

#[sqlx::test(migrations = "./migrations")]
async fn editing_someone_elses_profile_is_forbidden(pool: PgPool) {
    let mut owner = Client::new(pool.clone());
    let owner_id = owner.signup("owner").await;
    let mut intruder = Client::new(pool);
    intruder.signup("intruder").await;

    let page = intruder.get(&format!("/users/{owner_id}/profile")).await;
    assert_eq!(page.status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "./migrations")]
async fn profile_edit_with_wrong_password_redirects_home(pool: PgPool) {
    let mut client = Client::new(pool);
    let id = client.signup("editme").await;

    let page = client
        .post(
            &format!("/users/{id}/profile"),
            &[
                ("username", "edited"),
                ("email", "editme@example.com"),
                ("password", "not-my-password"),
            ],
        )
        .await;
    assert_eq!(page.location.as_deref(), Some("/"));
    let home = client.follow(page).await;
    assert!(home.body.contains("The password is incorrect!"));

    let page = client
        .post(
            &format!("/users/{id}/profile"),
            &[
                ("username", "edited"),
                ("email", "editme@example.com"),
                ("bio", "Now with a bio"),
                ("password", "password"),
            ],
        )
        .await;
    assert_eq!(page.location, Some(format!("/users/{id}")));
    let profile = client.follow(page).await;
    assert!(profile.body.contains("@edited"));
    assert!(profile.body.contains("Now with a bio"));
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_account_logs_out(pool: PgPool) {
    let mut client = Client::new(pool);
    let id = client.signup("shortlived").await;

    let page = client.post("/users/delete", &[]).await;
    assert_eq!(page.location.as_deref(), Some("/signup"));

    let profile = client.get(&format!("/users/{id}")).await;
    assert_eq!(profile.status, StatusCode::NOT_FOUND);
    let home = client.get("/").await;
    assert!(home.body.contains("Sign up"));
}

#[sqlx::test(migrations = "./migrations")]
async fn directory_search_filters_users(pool: PgPool) {
    let mut client = Client::new(pool);
    client.signup("searcher").await;
    client.get("/logout").await;
    client.signup("findme").await;

    let page = client.get("/users?q=find").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("@findme"));
    assert!(!page.body.contains("@searcher"));

    let none = client.get("/users?q=zzz").await;
    assert!(none.body.contains("Sorry, no users found"));
}

#[sqlx::test(migrations = "./migrations")]
async fn unknown_routes_render_not_found_page(pool: PgPool) {
    let mut client = Client::new(pool);

    let page = client.get("/no/such/page").await;
    assert_eq!(page.status, StatusCode::NOT_FOUND);

    let missing = client.get("/users/987654").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn non_numeric_ids_render_not_found_page(pool: PgPool) {
    let mut client = Client::new(pool);

    for uri in ["/users/abc", "/messages/abc", "/users/99999999999999999999"] {
        let page = client.get(uri).await;
        assert_eq!(page.status, StatusCode::NOT_FOUND, "{uri}");
        assert!(page.body.contains("class=\"error-page\""), "{uri}");
    }

    client.signup("numeric").await;
    let following = client.get("/users/abc/following").await;
    assert_eq!(following.status, StatusCode::NOT_FOUND);
    assert!(following.body.contains("class=\"error-page\""));
    assert!(following.body.contains("alt=\"numeric\""));

    let follow = client.post("/users/follow/abc", &[]).await;
    assert_eq!(follow.status, StatusCode::NOT_FOUND);
    let like = client.post("/users/add_like/abc", &[]).await;
    assert_eq!(like.status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn database_health_check_answers_no_content(pool: PgPool) {
    let mut client = Client::new(pool);

    let page = client.get("/_health/db").await;
    assert_eq!(page.status, StatusCode::NO_CONTENT);
    assert!(page.body.is_empty());
}

#[tokio::test]
async fn signed_in_requests_fail_when_the_database_is_down() {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(250))
        .connect_lazy("postgres://warbler@127.0.0.1:1/warbler")
        .unwrap();
    let mut client = Client::new(pool);

    let config = SessionConfig::new("test secret", "warbler_session", false);
    let session = Session::from_headers(&HeaderMap::new(), &config).login(1);
    client.store_cookies(&(session, ()).into_response());
    assert!(client.cookies.contains_key("warbler_session"));

    let home = client.get("/").await;
    assert!(home.status.is_server_error(), "GET / gave {}", home.status);
    assert!(!home.body.contains("Sign up now"));

    let post = client.post("/messages/new", &[("text", "lost")]).await;
    assert!(post.status.is_server_error(), "POST gave {}", post.status);
    assert_eq!(post.location, None);
    assert!(!client.cookies.contains_key("warbler_flash"));

    let health = client.get("/_health/db").await;
    assert_eq!(health.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[sqlx::test(migrations = "./migrations")]
async fn pages_are_not_cached(pool: PgPool) {
    let client = Client::new(pool);
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = client.router.clone().oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=0"
    );
    assert_eq!(response.headers().get(header::PRAGMA).unwrap(), "no-cache");
    assert_eq!(response.headers().get(header::EXPIRES).unwrap(), "0");
}

#[sqlx::test(migrations = "./migrations")]
async fn static_assets_are_served(pool: PgPool) {
    let mut client = Client::new(pool);

    let page = client.get("/static/stylesheets/style.css").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains(".navbar"));
}
