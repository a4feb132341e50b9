//! Human-facing alarm confirmation page, linked from the notification
//! e-mails. Rendered with Handlebars from an inline template.

use axum::{
	extract::{Query, State},
	response::Html,
};
use chrono::DateTime;
use handlebars::Handlebars;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::engine::AlarmEngine;
use crate::prelude::*;

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Alarm confirmation</title></head>
<body>
<h1>Request limit alarm</h1>
<table>
<tr><td>Service</td><td>{{service}}</td></tr>
<tr><td>User</td><td>{{username}} (id {{userId}})</td></tr>
<tr><td>Client address</td><td>{{clientIp}}</td></tr>
<tr><td>Requests observed</td><td>{{numRequests}} in {{interval}} (limit {{threshold}}, +{{exceedPercent}}%)</td></tr>
<tr><td>Detected</td><td>{{created}}</td></tr>
</table>
{{#if reviews}}
<h2>Reviews</h2>
<ul>
{{#each reviews}}<li>{{this.who}} at {{this.when}}</li>
{{/each}}</ul>
{{else}}
<p>This alarm has not been reviewed yet.</p>
{{/if}}
{{#if ban}}
<p>The user is banned until {{ban.end}} (ban #{{ban.id}}).</p>
{{/if}}
<form method="post" action="/alarm/{{reviewCode}}/confirmation">
<label>Your e-mail address: <input type="text" name="reviewer" value="{{reviewer}}"></label>
<label>Ban duration in hours (0 = no ban): <input type="number" name="banHours" value="0" min="0"></label>
<button type="submit">Confirm alarm</button>
</form>
</body>
</html>
"#;

fn format_time(t: Timestamp) -> String {
	DateTime::from_timestamp(t.0, 0)
		.map_or_else(|| t.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
	id: String,
	reviewer: Option<String>,
}

/// Show an alarm report to a reviewer. Viewing never records anything;
/// the embedded form submits to the confirmation endpoint, with the
/// `reviewer` parameter only pre-filling the form (the notification
/// e-mails link here with the recipient's own address).
pub async fn confirmation_page(
	State(engine): State<Arc<AlarmEngine>>,
	Query(params): Query<PageParams>,
) -> GpResult<Html<String>> {
	let reports = engine.reports();
	let reviewer = params.reviewer.as_deref().unwrap_or("").trim().to_string();
	let report = reports.find_by_code(&params.id).ok_or(Error::ConfirmationKeyNotFound)?;
	let ban = engine.bans().find_ban_by_report(&params.id).await?;

	let info = &report.request_info;
	let data = json!({
		"service": &*info.service,
		"username": report.user_info.as_ref().map_or("unknown", |user| &*user.username),
		"userId": info.user_id,
		"clientIp": info.client_ip.to_string(),
		"numRequests": info.num_requests,
		"interval": report.rules.check_interval.to_string(),
		"threshold": report.rules.threshold,
		"exceedPercent": format!("{:.0}", report.exceed_percent()),
		"created": format_time(report.created),
		"reviewCode": &*report.review_code,
		"reviewer": reviewer,
		"reviews": report.reviews.iter().map(|review| json!({
			"who": review.email.as_deref().map_or_else(
				|| review.user_id.map_or_else(String::new, |id| format!("user {id}")),
				ToString::to_string,
			),
			"when": format_time(review.reviewed),
		})).collect::<Vec<_>>(),
		"ban": ban.map(|ban| json!({
			"id": ban.ban_id,
			"end": format_time(ban.end),
		})),
	});

	let html = Handlebars::new()
		.render_template(PAGE_TEMPLATE, &data)
		.map_err(|err| Error::Internal(format!("failed to render confirmation page: {err}")))?;
	Ok(Html(html))
}


// vim: ts=4
