//! Operator-facing HTTP API: report listing, retention cleanup and the
//! JSON confirmation endpoint.

use axum::{
	Json, Router,
	extract::{Form, FromRequest, Path, Query, Request, State},
	http::{StatusCode, header},
	routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use guardpost_types::guard_adapter::BanId;

use crate::engine::AlarmEngine;
use crate::page;
use crate::prelude::*;
use crate::report::AlarmReport;

pub fn routes(engine: Arc<AlarmEngine>) -> Router {
	Router::new()
		.route("/alarm/reports", get(list_reports))
		.route("/alarm/clean", post(clean_reports))
		.route("/alarm/{review_code}/confirmation", post(confirm_report))
		.route("/alarm-confirmation", get(page::confirmation_page))
		.with_state(engine)
}

/// Parse a duration like `90s`, `1h30m` or `30d` into seconds.
/// A bare number is taken as seconds.
fn parse_max_age(value: &str) -> GpResult<i64> {
	let value = value.trim();
	let mut total: i64 = 0;
	let mut digits = String::new();
	for c in value.chars() {
		match c {
			'0'..='9' => digits.push(c),
			's' | 'm' | 'h' | 'd' => {
				let n: i64 = digits
					.parse()
					.map_err(|_| Error::ValidationError(format!("invalid maxAge: {value}")))?;
				digits.clear();
				let multiplier = match c {
					's' => 1,
					'm' => 60,
					'h' => 3600,
					_ => 86400,
				};
				total += n * multiplier;
			}
			_ => return Err(Error::ValidationError(format!("invalid maxAge: {value}"))),
		}
	}
	if !digits.is_empty() {
		// trailing bare number means seconds
		total += digits
			.parse::<i64>()
			.map_err(|_| Error::ValidationError(format!("invalid maxAge: {value}")))?;
	}
	if total <= 0 {
		return Err(Error::ValidationError("maxAge must be positive".into()));
	}
	Ok(total)
}

async fn list_reports(State(engine): State<Arc<AlarmEngine>>) -> Json<Value> {
	let reports = engine.reports().list_sorted();
	Json(json!({ "reports": reports }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CleanParams {
	max_age: Option<String>,
	also_non_reviewed: Option<String>,
}

async fn clean_reports(
	State(engine): State<Arc<AlarmEngine>>,
	Query(params): Query<CleanParams>,
) -> GpResult<Json<Value>> {
	let max_age = params
		.max_age
		.as_deref()
		.ok_or_else(|| Error::ValidationError("maxAge parameter is required".into()))?;
	let max_age_secs = parse_max_age(max_age)?;
	let also_non_reviewed = params.also_non_reviewed.as_deref() == Some("1");

	let (deleted, remaining) = engine.reports().clean(now(), max_age_secs, also_non_reviewed);
	info!(deleted, remaining, also_non_reviewed, "Cleaned alarm reports");
	Ok(Json(json!({ "numDeleted": deleted, "numRemaining": remaining })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmBody {
	/// E-mail address of the person confirming the alarm
	reviewer: String,
	/// When positive, also ban the reported user for this many hours;
	/// zero or absent confirms without a ban
	ban_hours: Option<u32>,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmResponse {
	confirmed: bool,
	report: AlarmReport,
	#[serde(skip_serializing_if = "Option::is_none")]
	ban_id: Option<BanId>,
}

/// API clients send JSON, the confirmation page submits the same fields
/// form-encoded.
async fn read_confirm_body(request: Request) -> GpResult<ConfirmBody> {
	let form_encoded = request
		.headers()
		.get(header::CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
	if form_encoded {
		let Form(body) = Form::from_request(request, &())
			.await
			.map_err(|err| Error::ValidationError(err.to_string()))?;
		Ok(body)
	} else {
		let Json(body) = Json::from_request(request, &())
			.await
			.map_err(|err| Error::ValidationError(err.to_string()))?;
		Ok(body)
	}
}

async fn confirm_report(
	State(engine): State<Arc<AlarmEngine>>,
	Path(review_code): Path<String>,
	request: Request,
) -> GpResult<(StatusCode, Json<ConfirmResponse>)> {
	let body = read_confirm_body(request).await?;
	let at = now();
	let report = engine
		.reports()
		.confirm_with(&review_code, |report| {
			report.confirm_via_email(&review_code, &body.reviewer, at)
		})?;
	info!(
		service = %report.request_info.service,
		reviewer = %body.reviewer,
		"Alarm report confirmed"
	);

	let mut ban_id = None;
	if let Some(hours) = body.ban_hours.filter(|hours| *hours > 0) {
		let end = at.add_secs(i64::from(hours) * 3600);
		let id = engine
			.bans()
			.ban_user(report.request_info.user_id, Some(&review_code), at, end)
			.await?;
		info!(
			user_id = %report.request_info.user_id,
			ban_id = id,
			hours,
			"User banned following alarm confirmation"
		);
		ban_id = Some(id);
	}

	Ok((StatusCode::OK, Json(ConfirmResponse { confirmed: true, report, ban_id })))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::conf::LimitingConf;
	use crate::engine::Collaborators;
	use crate::registry::{Limit, ServiceAlarmConf};
	use crate::report::RequestSnapshot;
	use crate::test_support::{
		MemBanStore, RecordingNotify, RecordingReporter, StaticAllowList, StaticUserDirectory,
	};
	use axum::body::Body;
	use axum::http::Request;
	use guardpost_types::notify_adapter::NotifyConf;
	use guardpost_types::worker::WorkerPool;
	use http_body_util::BodyExt;
	use tower::util::ServiceExt;

	fn engine_with_report() -> (Arc<AlarmEngine>, String) {
		let collab = Collaborators {
			allow_list: Arc::new(StaticAllowList::default()),
			bans: Arc::new(MemBanStore::new()),
			users: Arc::new(StaticUserDirectory::with_user(7, "mallory")),
			notify: Arc::new(RecordingNotify::new()),
			reporting: Arc::new(RecordingReporter::new()),
		};
		let workers = Arc::new(WorkerPool::new(1, 1));
		let engine =
			AlarmEngine::new(LimitingConf::default(), NotifyConf::default(), collab, workers)
				.unwrap();
		engine.register_service(
			"demo",
			ServiceAlarmConf { recipients: vec![], cleanup_probability: 0.5 },
			&[Limit { threshold: 10, check_interval: CheckInterval(60) }],
		);
		let report = AlarmReport::new(
			RequestSnapshot {
				service: "demo".into(),
				num_requests: 15,
				user_id: UserId(7),
				client_ip: "1.2.3.4".parse().unwrap(),
				created: Timestamp(1000),
			},
			Limit { threshold: 10, check_interval: CheckInterval(60) },
			Timestamp(1000),
		);
		let code = report.review_code.to_string();
		engine.reports().push(report);
		(engine, code)
	}

	async fn body_json(response: axum::response::Response) -> Value {
		let bytes = response.into_body().collect().await.unwrap().to_bytes();
		serde_json::from_slice(&bytes).unwrap()
	}

	#[test]
	fn test_parse_max_age() {
		assert_eq!(parse_max_age("90s").unwrap(), 90);
		assert_eq!(parse_max_age("15m").unwrap(), 900);
		assert_eq!(parse_max_age("24h").unwrap(), 86400);
		assert_eq!(parse_max_age("30d").unwrap(), 2_592_000);
		assert_eq!(parse_max_age("1h30m").unwrap(), 5400);
		assert_eq!(parse_max_age("120").unwrap(), 120);
		assert!(parse_max_age("0s").is_err());
		assert!(parse_max_age("-5m").is_err());
		assert!(parse_max_age("h").is_err());
		assert!(parse_max_age("").is_err());
	}

	#[tokio::test]
	async fn test_list_reports() {
		let (engine, _) = engine_with_report();
		let response = routes(engine)
			.oneshot(Request::get("/alarm/reports").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let json = body_json(response).await;
		assert_eq!(json["reports"].as_array().unwrap().len(), 1);
		assert_eq!(json["reports"][0]["requestInfo"]["numRequests"], 15);
	}

	#[tokio::test]
	async fn test_clean_requires_max_age() {
		let (engine, _) = engine_with_report();
		let response = routes(engine)
			.oneshot(Request::post("/alarm/clean").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		let json = body_json(response).await;
		assert_eq!(json["error"]["code"], "E-VALIDATION");
	}

	#[tokio::test]
	async fn test_clean_keeps_pending_reports() {
		let (engine, _) = engine_with_report();
		let response = routes(engine)
			.oneshot(Request::post("/alarm/clean?maxAge=1h").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let json = body_json(response).await;
		// the only report is old but unreviewed, so it is kept
		assert_eq!(json["numDeleted"], 0);
		assert_eq!(json["numRemaining"], 1);
	}

	#[tokio::test]
	async fn test_confirm_and_ban() {
		let (engine, code) = engine_with_report();
		let response = routes(Arc::clone(&engine))
			.oneshot(
				Request::post(format!("/alarm/{code}/confirmation"))
					.header("content-type", "application/json")
					.body(Body::from(r#"{"reviewer":"ops@example.com","banHours":24}"#))
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let json = body_json(response).await;
		assert_eq!(json["confirmed"], true);
		assert!(json["banId"].as_i64().is_some());
		assert!(json["report"]["reviewed"].as_i64().is_some());

		// overlapping second ban attempt
		let response = routes(engine)
			.oneshot(
				Request::post(format!("/alarm/{code}/confirmation"))
					.header("content-type", "application/json")
					.body(Body::from(r#"{"reviewer":"other@example.com","banHours":2}"#))
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::CONFLICT);
		let json = body_json(response).await;
		assert_eq!(json["error"]["code"], "E-ALREADY-BANNED");
	}

	#[tokio::test]
	async fn test_confirm_with_zero_ban_hours_skips_ban() {
		let (engine, code) = engine_with_report();
		let response = routes(Arc::clone(&engine))
			.oneshot(
				Request::post(format!("/alarm/{code}/confirmation"))
					.header("content-type", "application/json")
					.body(Body::from(r#"{"reviewer":"ops@example.com","banHours":0}"#))
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let json = body_json(response).await;
		assert_eq!(json["confirmed"], true);
		assert!(json["banId"].is_null());
		assert!(json["report"]["reviewed"].as_i64().is_some());
		assert!(engine.bans().find_ban_by_report(&code).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_confirm_accepts_form_body() {
		let (engine, code) = engine_with_report();
		let response = routes(Arc::clone(&engine))
			.oneshot(
				Request::post(format!("/alarm/{code}/confirmation"))
					.header("content-type", "application/x-www-form-urlencoded")
					.body(Body::from("reviewer=ops%40example.com&banHours=0"))
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let json = body_json(response).await;
		assert_eq!(json["confirmed"], true);
		assert!(engine.reports().list_sorted()[0].is_reviewed());
	}

	#[tokio::test]
	async fn test_confirm_unknown_code() {
		let (engine, _) = engine_with_report();
		let response = routes(engine)
			.oneshot(
				Request::post("/alarm/deadbeef/confirmation")
					.header("content-type", "application/json")
					.body(Body::from(r#"{"reviewer":"ops@example.com"}"#))
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
		let json = body_json(response).await;
		assert_eq!(json["error"]["code"], "E-ALARM-NOT-FOUND");
	}

	#[tokio::test]
	async fn test_confirm_without_reviewer() {
		let (engine, code) = engine_with_report();
		let response = routes(engine)
			.oneshot(
				Request::post(format!("/alarm/{code}/confirmation"))
					.header("content-type", "application/json")
					.body(Body::from(r#"{"reviewer":""}"#))
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		let json = body_json(response).await;
		assert_eq!(json["error"]["code"], "E-MISSING-REVIEWER");
	}
}

// vim: ts=4
