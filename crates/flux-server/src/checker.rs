use clap::Parser;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::info;

use flux_config::CheckerConfig;
use flux_monitor::{AlertFactory, CheckResult, DEFAULT_TIMEOUT};
use flux_types::{Alert, BusMessage, MessageHeaders, Severity};

pub const PROGRAM: &str = "alert-checker";

pub const VALID_ENVIRONMENTS: [&str; 9] = [
    "PROD", "REL", "QA", "TEST", "CODE", "STAGE", "DEV", "LWP", "INFRA",
];

/// 插件没有输出可识别的值
pub const UNMATCHED: &str = "unmatched";

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Must supply one or more environments from {}", VALID_ENVIRONMENTS.join(","))]
    InvalidEnvironment(String),

    #[error("Must supply one or more service using -S or --service")]
    MissingService,

    #[error("Invalid severity: {0}")]
    InvalidSeverity(String),

    #[error("Invalid plugin command line: {0}")]
    CommandLine(String),

    #[error("Failed to run plugin {command}: {source}")]
    Plugin {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// 运行检查插件并把结果作为告警发送
#[derive(Parser, Debug, Clone)]
#[command(
    name = "alert-checker",
    version,
    about = "Runs a check plug-in and sends the result to the alerting system",
    after_help = "alert-checker --nagios \"check_procs -w 10 -c 20 --metric=CPU\" --resource Server1 --event ProcStatus --group OS --environment PROD --service Discussion"
)]
pub struct CheckerArgs {
    /// Config file path
    #[arg(short, long, default_value = "alerta.toml")]
    pub config: String,

    /// Check plug-in command line, relative to the plug-in directory
    #[arg(short, long)]
    pub nagios: Option<String>,

    /// Resource under alarm eg. hostname, network device, application
    #[arg(short, long)]
    pub resource: String,

    /// Event name eg. HostAvail, PingResponse, AppStatus
    #[arg(short, long)]
    pub event: String,

    /// Event group eg. Application, Backup, Database, OS, Performance
    #[arg(short, long, default_value = "Misc")]
    pub group: String,

    /// Environment eg. PROD, REL, QA, TEST, CODE, STAGE, DEV, LWP, INFRA
    #[arg(short = 'E', long, required = true)]
    pub environment: Vec<String>,

    /// Service eg. R1, R2, Discussion, ContentAPI
    #[arg(short = 'S', long, visible_alias = "svc", required = true)]
    pub service: Vec<String>,

    /// Tag the event with anything and everything
    #[arg(short = 'T', long = "tag")]
    pub tags: Vec<String>,

    /// Timeout in seconds that an OPEN alert will persist
    #[arg(short = 'o', long, default_value_t = DEFAULT_TIMEOUT)]
    pub timeout: u64,

    /// Severity when no plug-in is run
    #[arg(short, long)]
    pub severity: Option<String>,

    /// Event value when no plug-in is run
    #[arg(short, long)]
    pub value: Option<String>,

    /// Event text when no plug-in is run
    #[arg(short, long)]
    pub text: Option<String>,

    /// Do not display alert id
    #[arg(short, long)]
    pub quiet: bool,

    /// Do not send alert
    #[arg(short, long)]
    pub dry_run: bool,
}

/// 插件运行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginOutput {
    /// 被信号终止时没有退出码
    pub exit_code: Option<i32>,
    pub stdout: String,
}

impl PluginOutput {
    /// 退出码 0/1/2/3 对应 Normal/Warning/Critical/Inform
    pub fn severity(&self) -> Severity {
        match self.exit_code {
            Some(0) => Severity::Normal,
            Some(1) => Severity::Warning,
            Some(2) => Severity::Critical,
            Some(3) => Severity::Inform,
            _ => Severity::Unknown,
        }
    }

    /// 第一行中最后一个分隔符（`-`、`|` 或 `:`，前面可有空白）之前的部分
    ///
    /// 分隔符前的空白可以跨行；结果不去除尾部空白。
    pub fn value(&self) -> String {
        let first_line_end = self.stdout.find('\n').unwrap_or(self.stdout.len());
        (0..=first_line_end)
            .rev()
            .filter(|&end| self.stdout.is_char_boundary(end))
            .find(|&end| self.stdout[end..].trim_start().starts_with(['-', '|', ':']))
            .map(|end| self.stdout[..end].to_string())
            .unwrap_or_else(|| UNMATCHED.to_string())
    }

    pub fn text(&self) -> String {
        self.stdout.trim().to_string()
    }
}

/// 按 shell 规则拆分命令行（支持单双引号和反斜杠转义）
pub fn split_command_line(line: &str) -> Result<Vec<String>, CheckError> {
    shlex::split(line)
        .ok_or_else(|| CheckError::CommandLine(format!("unbalanced quoting in {:?}", line)))
}

/// 在插件目录中运行插件
pub async fn run_plugin(plugin_dir: &str, command_line: &str) -> Result<PluginOutput, CheckError> {
    let words = split_command_line(command_line)?;
    let Some((program, args)) = words.split_first() else {
        return Err(CheckError::CommandLine("empty command".to_string()));
    };
    let program = Path::new(plugin_dir).join(program);

    info!(program = %program.display(), args = ?args, "Running check plugin");

    let output = Command::new(&program)
        .args(args)
        .output()
        .await
        .map_err(|source| CheckError::Plugin {
            command: command_line.to_string(),
            source,
        })?;

    Ok(PluginOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    })
}

/// 环境名不区分大小写，统一转为大写
pub fn validate_environments(environments: &[String]) -> Result<Vec<String>, CheckError> {
    if environments.is_empty() {
        return Err(CheckError::InvalidEnvironment(String::new()));
    }
    environments
        .iter()
        .map(|env| {
            let upper = env.to_uppercase();
            if VALID_ENVIRONMENTS.contains(&upper.as_str()) {
                Ok(upper)
            } else {
                Err(CheckError::InvalidEnvironment(env.clone()))
            }
        })
        .collect()
}

impl CheckerArgs {
    /// 校验环境和服务，返回大写的环境名
    pub fn validate(&self) -> Result<Vec<String>, CheckError> {
        let environment = validate_environments(&self.environment)?;
        if self.service.is_empty() {
            return Err(CheckError::MissingService);
        }
        Ok(environment)
    }

    /// 由参数和插件结果构造检查结果
    pub fn check_result(&self, plugin: Option<&PluginOutput>) -> Result<CheckResult, CheckError> {
        let environment = self.validate()?;

        let (severity, value, text, threshold_info) = match plugin {
            Some(output) => (
                output.severity(),
                output.value(),
                output.text(),
                self.nagios.clone().unwrap_or_else(|| "n/a".to_string()),
            ),
            None => {
                let severity = match &self.severity {
                    Some(raw) => Severity::parse(raw)
                        .ok_or_else(|| CheckError::InvalidSeverity(raw.clone()))?,
                    None => Severity::Normal,
                };
                (
                    severity,
                    self.value.clone().unwrap_or_default(),
                    self.text.clone().unwrap_or_default(),
                    "n/a".to_string(),
                )
            }
        };

        Ok(CheckResult {
            resource: self.resource.clone(),
            event: self.event.clone(),
            group: self.group.clone(),
            value,
            severity,
            environment,
            service: self.service.clone(),
            tags: self.tags.clone(),
            text,
            timeout: self.timeout,
            threshold_info,
        })
    }

    /// 运行插件（如有）并构造告警和消息头
    pub async fn prepare(
        &self,
        config: &CheckerConfig,
        hostname: &str,
    ) -> Result<(Alert, MessageHeaders), CheckError> {
        // 先校验参数，避免无效参数时运行插件
        self.validate()?;

        let plugin = match &self.nagios {
            Some(command_line) => Some(run_plugin(&config.plugin_dir, command_line).await?),
            None => None,
        };
        let check = self.check_result(plugin.as_ref())?;

        let alert = AlertFactory::new(PROGRAM, hostname).from_check(check);
        let window = chrono::Duration::seconds(config.expiration_secs as i64);
        let headers = MessageHeaders::for_alert(&alert).expiring(alert.create_time, window);

        if let Some(output) = &plugin {
            info!(
                alert_id = %alert.id,
                exit_code = ?output.exit_code,
                text = %alert.text,
                "Check plugin finished"
            );
        }
        Ok((alert, headers))
    }
}

/// dry-run 输出：消息头和告警的格式化 JSON
pub fn dry_run_output(alert: &Alert, headers: &MessageHeaders) -> serde_json::Result<String> {
    let message = BusMessage::from_alert(alert, headers.clone())?;
    serde_json::to_string_pretty(&message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CheckerArgs {
        let mut argv = vec![
            "alert-checker",
            "-r",
            "web01",
            "-e",
            "HostAvail",
            "-E",
            "prod",
            "-S",
            "Web",
        ];
        argv.extend_from_slice(extra);
        CheckerArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_argument_defaults() {
        let args = args(&[]);
        assert_eq!(args.group, "Misc");
        assert_eq!(args.timeout, 86400);
        assert!(!args.quiet);
        assert!(!args.dry_run);
        assert!(args.nagios.is_none());
    }

    #[test]
    fn test_required_arguments() {
        assert!(CheckerArgs::try_parse_from(["alert-checker", "-e", "X", "-E", "PROD", "-S", "Web"]).is_err());
        assert!(CheckerArgs::try_parse_from(["alert-checker", "-r", "x", "-e", "X", "-S", "Web"]).is_err());
        assert!(CheckerArgs::try_parse_from(["alert-checker", "-r", "x", "-e", "X", "-E", "PROD"]).is_err());
    }

    #[test]
    fn test_repeatable_arguments() {
        let args = args(&["-E", "rel", "--svc", "Api", "-T", "a", "-T", "b"]);
        assert_eq!(args.environment, vec!["prod", "rel"]);
        assert_eq!(args.service, vec!["Web", "Api"]);
        assert_eq!(args.tags, vec!["a", "b"]);
    }

    #[test]
    fn test_environment_validation() {
        let envs = vec!["prod".to_string(), "Infra".to_string()];
        assert_eq!(validate_environments(&envs).unwrap(), vec!["PROD", "INFRA"]);

        let envs = vec!["PROD".to_string(), "LIVE".to_string()];
        assert!(matches!(
            validate_environments(&envs),
            Err(CheckError::InvalidEnvironment(env)) if env == "LIVE"
        ));
    }

    #[test]
    fn test_check_result_without_plugin() {
        let result = args(&["-s", "major", "-v", "down", "-t", "ping timeout"])
            .check_result(None)
            .unwrap();
        assert_eq!(result.environment, vec!["PROD"]);
        assert_eq!(result.severity, Severity::Major);
        assert_eq!(result.value, "down");
        assert_eq!(result.text, "ping timeout");
        assert_eq!(result.threshold_info, "n/a");

        assert!(matches!(
            args(&["-s", "loud"]).check_result(None),
            Err(CheckError::InvalidSeverity(_))
        ));
        assert_eq!(args(&[]).check_result(None).unwrap().severity, Severity::Normal);
    }

    #[test]
    fn test_plugin_output_parsing() {
        let output = PluginOutput {
            exit_code: Some(1),
            stdout: "DISK WARNING - free space: / 10%\nsecond line\n".to_string(),
        };
        assert_eq!(output.severity(), Severity::Warning);
        assert_eq!(output.value(), "DISK WARNING - free space");
        assert_eq!(output.text(), "DISK WARNING - free space: / 10%\nsecond line");

        let output = PluginOutput {
            exit_code: Some(0),
            stdout: "PROCS OK: 5 processes | procs=5".to_string(),
        };
        assert_eq!(output.value(), "PROCS OK: 5 processes ");

        let output = PluginOutput {
            exit_code: Some(0),
            stdout: "HTTP OK\n - 200 in 0.1s".to_string(),
        };
        assert_eq!(output.value(), "HTTP OK");

        let output = PluginOutput {
            exit_code: Some(0),
            stdout: "first line\nsecond - line".to_string(),
        };
        assert_eq!(output.value(), UNMATCHED);

        let output = PluginOutput {
            exit_code: None,
            stdout: "no delimiters here".to_string(),
        };
        assert_eq!(output.severity(), Severity::Unknown);
        assert_eq!(output.value(), UNMATCHED);
    }

    #[test]
    fn test_exit_codes() {
        let severity = |code| {
            PluginOutput {
                exit_code: Some(code),
                stdout: String::new(),
            }
            .severity()
        };
        assert_eq!(severity(0), Severity::Normal);
        assert_eq!(severity(1), Severity::Warning);
        assert_eq!(severity(2), Severity::Critical);
        assert_eq!(severity(3), Severity::Inform);
        assert_eq!(severity(4), Severity::Unknown);
    }

    #[test]
    fn test_split_command_line() {
        assert_eq!(
            split_command_line("check_procs -w 10 -c 20 --metric=CPU").unwrap(),
            vec!["check_procs", "-w", "10", "-c", "20", "--metric=CPU"]
        );
        assert_eq!(
            split_command_line(r#"check_http -H 'web 01' -s "it's \"up\"""#).unwrap(),
            vec!["check_http", "-H", "web 01", "-s", r#"it's "up""#]
        );
        assert_eq!(split_command_line("a ''").unwrap(), vec!["a", ""]);
        assert!(split_command_line("check 'open").is_err());
        assert!(split_command_line("check \\").is_err());
        assert!(split_command_line("   ").unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_plugin() {
        let output = run_plugin("/nonexistent", "/bin/sh -c 'echo \"LOAD CRITICAL - load average: 9.1\"; exit 2'")
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(2));
        assert_eq!(output.severity(), Severity::Critical);
        assert_eq!(output.value(), "LOAD CRITICAL - load average");

        assert!(matches!(
            run_plugin("/nonexistent", "check_missing -w 1").await,
            Err(CheckError::Plugin { .. })
        ));
        assert!(matches!(run_plugin("/tmp", "").await, Err(CheckError::CommandLine(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prepare_with_plugin() {
        let args = args(&["-n", "/bin/sh -c 'echo \"PING OK - rtt 1ms\"'", "-T", "ping"]);
        let config = CheckerConfig::default();

        let (alert, headers) = args.prepare(&config, "checker01").await.unwrap();
        assert_eq!(alert.severity, Severity::Normal);
        assert_eq!(alert.previous_severity, Severity::Unknown);
        assert_eq!(alert.value, "PING OK ");
        assert_eq!(alert.text, "PING OK - rtt 1ms");
        assert_eq!(alert.alert_type, "exceptionAlert");
        assert_eq!(alert.origin, "alert-checker/checker01");
        assert_eq!(alert.threshold_info, "/bin/sh -c 'echo \"PING OK - rtt 1ms\"'");
        assert_eq!(alert.summary, "PROD - NORMAL HostAvail is PING OK  on Web web01");

        assert_eq!(headers.correlation_id, alert.id.to_string());
        assert_eq!(
            headers.expires,
            Some(alert.create_time.timestamp_millis() + 600_000)
        );
    }

    #[tokio::test]
    async fn test_prepare_rejects_invalid_environment_before_running() {
        let mut args = args(&["-n", "check_missing"]);
        args.environment = vec!["LIVE".to_string()];

        assert!(matches!(
            args.prepare(&CheckerConfig::default(), "checker01").await,
            Err(CheckError::InvalidEnvironment(_))
        ));
    }

    #[test]
    fn test_dry_run_output() {
        let check = args(&["-v", "up"]).check_result(None).unwrap();
        let alert = AlertFactory::new(PROGRAM, "checker01").from_check(check);
        let headers = MessageHeaders::for_alert(&alert);

        let raw = dry_run_output(&alert, &headers).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["headers"]["type"], "exceptionAlert");
        assert_eq!(value["payload"]["resource"], "web01");
        assert_eq!(value["payload"]["severity"], "NORMAL");
        assert!(raw.contains('\n'));
    }
}
