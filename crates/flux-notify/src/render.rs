use chrono::{DateTime, FixedOffset, Local, Utc};
use handlebars::Handlebars;
use serde::Serialize;
use uuid::Uuid;

use flux_types::Alert;

use crate::error::{NotifyError, Result};
use crate::message::{InlineGraph, NotifyMessage};

const TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
const FOOTER_TIME_FORMAT: &str = "%a %d %b %H:%M:%S";

const SUBJECT_TEMPLATE: &str = "subject";
const TEXT_TEMPLATE: &str = "text";
const HTML_TEMPLATE: &str = "html";

fn register_templates(registry: &mut Handlebars<'static>) -> Result<()> {
    let templates = [
        (SUBJECT_TEMPLATE, r#"[{{{status}}}] {{{summary}}}"#),
        (
            TEXT_TEMPLATE,
            r#"{{{subject}}}
Alert Details
Alert ID: {{{alert_id}}}
{{#each details}}{{{label}}}: {{{value}}}
{{/each}}{{#if more_info}}More Info: {{{more_info}}}
{{/if}}Historical Data
{{#each graph_urls}}{{{this}}}
{{/each}}Raw Alert
{{{raw}}}
{{{footer}}}
"#,
        ),
        (
            HTML_TEMPLATE,
            r##"<p><table border="0" cellpadding="0" cellspacing="0" width="100%">
<tr><td bgcolor="#ffffff" align="center">
<table border="0" cellpadding="0" cellspacing="0" width="700">
<tr><td bgcolor="#425470"><p align="center" style="font-size:24px;color:#d9fffd;font-weight:bold;"><strong>{{subject}}</strong></p>
<tr><td><p align="left" style="font-size:18px;line-height:22px;color:#c25130;font-weight:bold;">Alert Details</p>
<table>
<tr><td><b>Alert ID:</b></td><td><a href="{{alerta_url}}/alerta/details.php?id={{alert_id}}" target="_blank">{{alert_id}}</a></td></tr>
{{#each details}}<tr><td><b>{{label}}:</b></td><td>{{value}}</td></tr>
{{/each}}{{#if more_info}}<tr><td><b>More Info:</b></td><td>{{#if more_info_link}}<a href="{{more_info}}" target="_blank">{{more_info}}</a>{{else}}{{more_info}}{{/if}}</td></tr>
{{/if}}</table>
</td></tr>
<tr><td><p align="left" style="font-size:18px;line-height:22px;color:#c25130;font-weight:bold;">Historical Data</p>
{{#each graph_ids}}<tr><td><img src="cid:{{this}}"></td></tr>
{{/each}}<tr><td><p align="left" style="font-size:18px;line-height:22px;color:#c25130;font-weight:bold;">Raw Alert</p>
<tr><td><p align="left" style="font-family: 'Courier New', Courier, monospace">{{raw}}</p></td></tr>
<tr><td>{{footer}}</td></tr>
</table></td></tr></table></td></tr></table>"##,
        ),
    ];

    for (name, template) in templates {
        registry
            .register_template_string(name, template)
            .map_err(|e| NotifyError::Template(format!("registering {} template: {}", name, e)))?;
    }
    Ok(())
}

/// 只有 http/https 链接才渲染成超链接
fn is_web_link(raw: &str) -> bool {
    reqwest::Url::parse(raw)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[derive(Debug, Serialize)]
struct Detail {
    label: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct TemplateData<'a> {
    status: String,
    summary: &'a str,
    subject: String,
    alerta_url: &'a str,
    alert_id: String,
    details: Vec<Detail>,
    more_info: Option<&'a str>,
    more_info_link: bool,
    graph_urls: &'a [String],
    graph_ids: Vec<&'a str>,
    raw: &'a str,
    footer: String,
}

/// 通知渲染器
///
/// 用 handlebars 模板生成主题、纯文本和 HTML 正文；HTML 中的字段自动转义。
/// 时间按本地时区显示，可用固定偏移覆盖。
#[derive(Debug, Clone)]
pub struct Renderer {
    registry: Handlebars<'static>,
    alerta_url: String,
    program: String,
    hostname: String,
    offset: Option<FixedOffset>,
}

impl Renderer {
    pub fn new(
        alerta_url: impl Into<String>,
        program: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Result<Self> {
        let mut registry = Handlebars::new();
        register_templates(&mut registry)?;

        Ok(Self {
            registry,
            alerta_url: alerta_url.into().trim_end_matches('/').to_string(),
            program: program.into(),
            hostname: hostname.into(),
            offset: None,
        })
    }

    /// 使用固定时区偏移代替本地时区
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    fn format_time(&self, time: &DateTime<Utc>, format: &str) -> String {
        match self.offset {
            Some(offset) => time.with_timezone(&offset).format(format).to_string(),
            None => time.with_timezone(&Local).format(format).to_string(),
        }
    }

    fn footer(&self) -> String {
        format!(
            "Generated by {} on {} at {}",
            self.program,
            self.hostname,
            self.format_time(&Utc::now(), FOOTER_TIME_FORMAT)
        )
    }

    fn details(&self, alert: &Alert) -> Vec<Detail> {
        let mut rows = vec![
            ("Create Time", self.format_time(&alert.create_time, TIME_FORMAT)),
            ("Resource", alert.resource.clone()),
            ("Environment", alert.environment.join(",")),
            ("Service", alert.service.join(",")),
            ("Event Name", alert.event.clone()),
            ("Event Group", alert.group.clone()),
            ("Event Value", alert.value.clone()),
            (
                "Severity",
                format!("{} -> {}", alert.previous_severity, alert.severity),
            ),
            ("Status", alert.status.to_string()),
            ("Text", alert.text.clone()),
        ];
        if !alert.threshold_info.is_empty() {
            rows.push(("Threshold Info", alert.threshold_info.clone()));
        }
        if let Some(count) = alert.duplicate_count {
            rows.push(("Duplicate Count", count.to_string()));
        }
        rows.into_iter()
            .map(|(label, value)| Detail { label, value })
            .collect()
    }

    fn render_template(&self, name: &str, data: &TemplateData<'_>) -> Result<String> {
        self.registry
            .render(name, data)
            .map_err(|e| NotifyError::Template(format!("rendering {} template: {}", name, e)))
    }

    /// 邮件主题：`[状态] 摘要`
    pub fn subject(&self, alert: &Alert) -> Result<String> {
        #[derive(Serialize)]
        struct Subject<'a> {
            status: String,
            summary: &'a str,
        }

        self.registry
            .render(
                SUBJECT_TEMPLATE,
                &Subject {
                    status: alert.status.to_string(),
                    summary: &alert.summary,
                },
            )
            .map_err(|e| NotifyError::Template(format!("rendering subject template: {}", e)))
    }

    /// 渲染通知消息
    pub fn render(&self, alert: &Alert) -> Result<NotifyMessage> {
        let raw = serde_json::to_string(alert).unwrap_or_default();
        let graphs: Vec<InlineGraph> = alert
            .graphs
            .iter()
            .map(|url| InlineGraph {
                content_id: Uuid::new_v4().to_string(),
                url: url.clone(),
            })
            .collect();

        let subject = self.subject(alert)?;
        let more_info = alert.more_info.as_deref().filter(|info| !info.is_empty());
        let data = TemplateData {
            status: alert.status.to_string(),
            summary: &alert.summary,
            subject: subject.clone(),
            alerta_url: &self.alerta_url,
            alert_id: alert.id.to_string(),
            details: self.details(alert),
            more_info,
            more_info_link: more_info.map(is_web_link).unwrap_or(false),
            graph_urls: &alert.graphs,
            graph_ids: graphs.iter().map(|g| g.content_id.as_str()).collect(),
            raw: &raw,
            footer: self.footer(),
        };

        let text = self.render_template(TEXT_TEMPLATE, &data)?;
        let html = self.render_template(HTML_TEMPLATE, &data)?;

        Ok(NotifyMessage::new(alert, subject, text, html).with_graphs(graphs))
    }
}
