//! HTTP handler functions for the bus directory API.

use actix_web::{HttpResponse, web};
use bus_directory_bus_models::{BusPatch, new_bus_from_submission};
use bus_directory_database_models::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use bus_directory_search::SearchParams;
use bus_directory_server_models::{
    ApiBus, ApiBusList, ApiBusMessage, ApiHealth, ApiMyVote, ApiPing, ApiRoute, ApiRoutes,
    ApiSearchResponse, ApiUser, ListQueryParams, SearchQueryParams, UploadUrlRequest,
};
use bus_directory_uploads::UploadKind;
use chrono::Utc;
use serde_json::Value;

use crate::AppState;
use crate::auth::Identity;
use crate::error::{ApiError, BUS_NOT_FOUND};

/// Number of records in the legacy route listing.
const ROUTE_LISTING_LIMIT: usize = 50;

type ApiResult = Result<HttpResponse, ApiError>;

fn json_object(body: Value) -> Result<serde_json::Map<String, Value>, ApiError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::BadRequest(
            "Request body must be a JSON object".to_string(),
        )),
    }
}

/// `GET /health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.repo.backend().to_string(),
    })
}

/// `GET /buses`
///
/// Pages through all buses in store order. A missing or zero `limit`
/// means the default page size.
pub async fn list_buses(
    state: web::Data<AppState>,
    params: web::Query<ListQueryParams>,
) -> ApiResult {
    let limit = params
        .limit
        .filter(|&n| n > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(MAX_PAGE_SIZE);
    let last_key = params
        .last_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    let page = state.repo.list(limit, last_key).await?;
    let buses: Vec<ApiBus> = page.buses.iter().map(ApiBus::from).collect();

    Ok(HttpResponse::Ok().json(ApiBusList {
        count: buses.len(),
        buses,
        last_key: page.last_key,
    }))
}

/// `GET /buses/{licenseNo}`
pub async fn get_bus(state: web::Data<AppState>, path: web::Path<String>) -> ApiResult {
    let license_no = path.into_inner();
    let bus = state
        .repo
        .get(&license_no)
        .await?
        .ok_or_else(|| ApiError::NotFound(BUS_NOT_FOUND.to_string()))?;

    Ok(HttpResponse::Ok().json(ApiBus::from(&bus)))
}

/// `POST /buses`
///
/// Creates a bus from the submitted attributes. The license number comes
/// from `licenseNo`, or `busNumber` when absent.
pub async fn create_bus(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<Value>,
) -> ApiResult {
    let bus = new_bus_from_submission(json_object(body.into_inner())?, Utc::now())?;
    state.repo.create(&bus).await?;

    log::info!("{} created bus {}", identity.email, bus.license_no);

    Ok(HttpResponse::Created().json(ApiBusMessage {
        message: "Bus created successfully".to_string(),
        bus: ApiBus::from(&bus),
    }))
}

/// `PUT /buses/{licenseNo}`
///
/// Overwrites the supplied fields. `{"verifiedVotes": "increment"}` instead
/// adds one to the legacy verification counter.
pub async fn update_bus(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> ApiResult {
    let license_no = path.into_inner();
    let fields = json_object(body.into_inner())?;

    if fields.get("verifiedVotes").and_then(Value::as_str) == Some("increment") {
        let bus = state.repo.increment_legacy_votes(&license_no).await?;
        log::info!("{} added a legacy vote to {license_no}", identity.email);
        return Ok(HttpResponse::Ok().json(ApiBusMessage {
            message: "Vote recorded successfully".to_string(),
            bus: ApiBus::from(&bus),
        }));
    }

    let bus = state.repo.update(&license_no, &BusPatch::new(fields)).await?;
    log::info!("{} updated bus {license_no}", identity.email);

    Ok(HttpResponse::Ok().json(ApiBusMessage {
        message: "Bus updated successfully".to_string(),
        bus: ApiBus::from(&bus),
    }))
}

/// `GET /search`
///
/// Text search, or directional search with `directional=true&from=&to=`.
pub async fn search(
    state: web::Data<AppState>,
    params: web::Query<SearchQueryParams>,
) -> ApiResult {
    let params = SearchParams::from(params.into_inner());
    let results = bus_directory_search::search(state.repo.as_ref(), &params).await?;
    Ok(HttpResponse::Ok().json(ApiSearchResponse::new(&results, &params)))
}

/// `POST /buses/{licenseNo}/verify`
pub async fn verify_bus(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> ApiResult {
    let outcome =
        bus_directory_votes::cast_verify(state.repo.as_ref(), &path, &identity.email).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// `POST /buses/{licenseNo}/report`
pub async fn report_bus(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> ApiResult {
    let outcome =
        bus_directory_votes::cast_report(state.repo.as_ref(), &path, &identity.email).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// `GET /buses/{licenseNo}/my-vote`
pub async fn my_vote(
    state: web::Data<AppState>,
    identity: Identity,
    path: web::Path<String>,
) -> ApiResult {
    let vote =
        bus_directory_votes::get_user_vote(state.repo.as_ref(), &path, &identity.email).await?;
    Ok(HttpResponse::Ok().json(ApiMyVote::from(vote)))
}

/// `GET /routes`
///
/// Legacy route listing over the first records in the store.
pub async fn routes(state: web::Data<AppState>) -> ApiResult {
    let buses = state.repo.scan_all(ROUTE_LISTING_LIMIT).await?;
    let routes: Vec<ApiRoute> = buses.iter().map(ApiRoute::from).collect();

    Ok(HttpResponse::Ok().json(ApiRoutes {
        count: routes.len(),
        routes,
    }))
}

/// `GET /protected/ping`
///
/// Echoes the caller so clients can check their token.
pub async fn ping(identity: Identity) -> HttpResponse {
    HttpResponse::Ok().json(ApiPing {
        message: "Protected endpoint accessible - authentication successful!".to_string(),
        user: ApiUser {
            email: identity.email,
            name: identity.name,
            sub: identity.sub,
        },
        timestamp: Utc::now(),
    })
}

/// `POST /uploads/avatar-url`
///
/// Issues a presigned S3 upload URL for an avatar or bus photo.
pub async fn upload_url(
    state: web::Data<AppState>,
    identity: Identity,
    body: web::Json<UploadUrlRequest>,
) -> ApiResult {
    let uploads = state
        .uploads
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Uploads are not configured".to_string()))?;

    let request = body.into_inner();
    let upload = uploads
        .presign(
            request.file_name.as_deref().unwrap_or_default(),
            request.content_type.as_deref().unwrap_or_default(),
            UploadKind::from_request(request.kind.as_deref()),
            &identity.email,
        )
        .await?;

    Ok(HttpResponse::Ok().json(upload))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::{StatusCode, header};
    use actix_web::{App, test, web};
    use bus_directory_database::memory::MemoryRepository;
    use serde_json::{Value, json};

    use crate::auth::AuthConfig;
    use crate::auth::tests::{SECRET, user_token};
    use crate::{AppState, configure};

    macro_rules! app {
        () => {
            app!(Arc::new(MemoryRepository::new()))
        };
        ($repo:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(AppState {
                        repo: $repo,
                        uploads: None,
                    }))
                    .app_data(web::Data::new(AuthConfig::with_secret(SECRET)))
                    .configure(configure),
            )
            .await
        };
    }

    fn bearer(email: &str) -> (header::HeaderName, String) {
        (header::AUTHORIZATION, format!("Bearer {}", user_token(email)))
    }

    fn nc_1234() -> Value {
        json!({
            "licenseNo": "NC-1234",
            "companyName": "Lanka Express",
            "from": "Colombo",
            "to": "Kandy",
            "busType": "luxury",
            "journeys": [{ "start": "06:00", "end": "09:00" }, { "start": "07:00", "end": "10:00" }],
            "returnJourneys": [{ "start": "14:00", "end": "17:00" }],
        })
    }

    #[actix_web::test]
    async fn health_reports_store() {
        let app = app!();
        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request())
                .await;
        assert_eq!(body["healthy"], true);
        assert_eq!(body["store"], "memory");
    }

    #[actix_web::test]
    async fn three_verifiers_verify_a_new_bus() {
        let app = app!();

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/buses")
                .insert_header(bearer("owner@bus.lk"))
                .set_json(nc_1234())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["message"], "Bus created successfully");
        assert_eq!(created["bus"]["route"], "Colombo → Kandy");
        assert_eq!(created["bus"]["verified"], false);

        for (i, email) in ["a@bus.lk", "b@bus.lk", "c@bus.lk"].into_iter().enumerate() {
            let outcome: Value = test::call_and_read_body_json(
                &app,
                test::TestRequest::post()
                    .uri("/buses/NC-1234/verify")
                    .insert_header(bearer(email))
                    .to_request(),
            )
            .await;
            assert_eq!(outcome["verifyDelta"], 1);
            assert_eq!(outcome["verifyCount"], i + 1);
            assert_eq!(outcome["userVote"], "verify");
        }

        let bus: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/buses/NC-1234").to_request(),
        )
        .await;
        assert_eq!(bus["verifyCount"], 3);
        assert_eq!(bus["verified"], true);
        assert_eq!(bus["dailyDepartures"], 3);
    }

    #[actix_web::test]
    async fn mutations_require_a_token() {
        let app = app!();
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/buses")
                .set_json(nc_1234())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/buses/NC-1234/verify")
                .insert_header((header::AUTHORIZATION, "Bearer garbage"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn duplicate_license_conflicts() {
        let app = app!();
        for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
            let resp = test::call_service(
                &app,
                test::TestRequest::post()
                    .uri("/buses")
                    .insert_header(bearer("owner@bus.lk"))
                    .set_json(nc_1234())
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), expected);
        }
    }

    #[actix_web::test]
    async fn create_rejects_missing_fields_and_bad_times() {
        let app = app!();

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/buses")
                .insert_header(bearer("owner@bus.lk"))
                .set_json(json!({ "licenseNo": "NC-1" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let mut body = nc_1234();
        body["journeys"] = json!([{ "start": "6am", "end": "09:00" }]);
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/buses")
                .insert_header(bearer("owner@bus.lk"))
                .set_json(body)
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn missing_bus_is_not_found() {
        let app = app!();
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/buses/NOPE").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Bus not found");

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/buses/NOPE/report")
                .insert_header(bearer("a@bus.lk"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/buses/NOPE/my-vote")
                .insert_header(bearer("a@bus.lk"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn update_recomputes_route_and_legacy_increment() {
        let app = app!();
        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/buses")
                .insert_header(bearer("owner@bus.lk"))
                .set_json(nc_1234())
                .to_request(),
        )
        .await;

        let updated: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::put()
                .uri("/buses/NC-1234")
                .insert_header(bearer("owner@bus.lk"))
                .set_json(json!({ "to": "Galle" }))
                .to_request(),
        )
        .await;
        assert_eq!(updated["message"], "Bus updated successfully");
        assert_eq!(updated["bus"]["route"], "Colombo → Galle");

        let voted: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::put()
                .uri("/buses/NC-1234")
                .insert_header(bearer("owner@bus.lk"))
                .set_json(json!({ "verifiedVotes": "increment" }))
                .to_request(),
        )
        .await;
        assert_eq!(voted["message"], "Vote recorded successfully");
        assert_eq!(voted["bus"]["verifiedVotes"], 1);

        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri("/buses/NOPE")
                .insert_header(bearer("owner@bus.lk"))
                .set_json(json!({ "to": "Galle" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn vote_toggle_and_my_vote() {
        let app = app!();
        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/buses")
                .insert_header(bearer("owner@bus.lk"))
                .set_json(nc_1234())
                .to_request(),
        )
        .await;

        let my_vote = |email: &'static str| {
            test::TestRequest::get()
                .uri("/buses/NC-1234/my-vote")
                .insert_header(bearer(email))
                .to_request()
        };

        let none: Value = test::call_and_read_body_json(&app, my_vote("a@bus.lk")).await;
        assert_eq!(none["hasVoted"], false);
        assert!(none["voteType"].is_null());

        let switched: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/buses/NC-1234/report")
                .insert_header(bearer("a@bus.lk"))
                .to_request(),
        )
        .await;
        assert_eq!(switched["reportCount"], 1);

        let mine: Value = test::call_and_read_body_json(&app, my_vote("a@bus.lk")).await;
        assert_eq!(mine["hasVoted"], true);
        assert_eq!(mine["voteType"], "report");

        let toggled: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::post()
                .uri("/buses/NC-1234/report")
                .insert_header(bearer("a@bus.lk"))
                .to_request(),
        )
        .await;
        assert_eq!(toggled["reportDelta"], -1);
        assert_eq!(toggled["reportCount"], 0);
        assert!(toggled["userVote"].is_null());
    }

    #[actix_web::test]
    async fn directional_search_over_http() {
        let app = app!();
        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/buses")
                .insert_header(bearer("owner@bus.lk"))
                .set_json(nc_1234())
                .to_request(),
        )
        .await;

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/search?directional=true&from=kandy&to=colombo")
                .to_request(),
        )
        .await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["directional"], true);
        assert_eq!(body["buses"][0]["direction"], "return");
        assert_eq!(body["buses"][0]["relevantJourneys"][0]["start"], "14:00");

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/search?directional=true&from=kandy")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn list_pages_with_last_key() {
        let app = app!();
        for license in ["A-1", "A-2", "A-3"] {
            let mut body = nc_1234();
            body["licenseNo"] = license.into();
            test::call_service(
                &app,
                test::TestRequest::post()
                    .uri("/buses")
                    .insert_header(bearer("owner@bus.lk"))
                    .set_json(body)
                    .to_request(),
            )
            .await;
        }

        let first: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/buses?limit=2").to_request(),
        )
        .await;
        assert_eq!(first["count"], 2);
        let last_key = first["lastKey"].as_str().unwrap().to_string();

        let rest: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri(&format!("/buses?limit=2&lastKey={last_key}"))
                .to_request(),
        )
        .await;
        assert_eq!(rest["count"], 1);
        assert!(rest["lastKey"].is_null());
    }

    #[actix_web::test]
    async fn zero_limit_uses_default_page_size() {
        let app = app!();
        for license in ["A-1", "A-2", "A-3"] {
            let mut body = nc_1234();
            body["licenseNo"] = license.into();
            test::call_service(
                &app,
                test::TestRequest::post()
                    .uri("/buses")
                    .insert_header(bearer("owner@bus.lk"))
                    .set_json(body)
                    .to_request(),
            )
            .await;
        }

        let page: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/buses?limit=0").to_request(),
        )
        .await;
        assert_eq!(page["count"], 3);
        assert!(page["lastKey"].is_null());
    }

    #[actix_web::test]
    async fn ping_echoes_caller() {
        let app = app!();
        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/protected/ping")
                .insert_header(bearer("a@bus.lk"))
                .to_request(),
        )
        .await;
        assert_eq!(body["user"]["email"], "a@bus.lk");
    }

    #[actix_web::test]
    async fn uploads_unavailable_without_bucket() {
        let app = app!();
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/uploads/avatar-url")
                .insert_header(bearer("a@bus.lk"))
                .set_json(json!({ "fileName": "me.png", "contentType": "image/png" }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn routes_lists_legacy_shape() {
        let app = app!();
        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/buses")
                .insert_header(bearer("owner@bus.lk"))
                .set_json(nc_1234())
                .to_request(),
        )
        .await;

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/routes").to_request(),
        )
        .await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["routes"][0]["headwayMins"], 15);
        assert_eq!(body["routes"][0]["popular"], false);
    }
}
