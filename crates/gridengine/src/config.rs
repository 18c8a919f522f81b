use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub name: String,
    /// Tool names routed to this queue, matched case-insensitively.
    #[serde(default)]
    pub tools: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "SchedulerConfig::default_qsub")]
    pub qsub_binary: String,

    #[serde(default = "SchedulerConfig::default_qstat")]
    pub qstat_binary: String,

    #[serde(default = "SchedulerConfig::default_qacct")]
    pub qacct_binary: String,

    /// Queue used when no non-default queue claims the tool.
    pub default_queue: String,

    #[serde(default)]
    pub queues: Vec<QueueConfig>,

    /// Seconds to wait for a scheduler probe before giving up.
    #[serde(default = "SchedulerConfig::default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl SchedulerConfig {
    fn default_qsub() -> String {
        "qsub".to_string()
    }

    fn default_qstat() -> String {
        "qstat".to_string()
    }

    fn default_qacct() -> String {
        "qacct".to_string()
    }

    fn default_probe_timeout_secs() -> u64 {
        10
    }

    /// The configured probe timeout, capped at 30 seconds.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs).min(MAX_PROBE_TIMEOUT)
    }

    /// Select the queue for a tool. Non-default queues are scanned in
    /// order and a later match overwrites an earlier one; this
    /// iterate-and-overwrite behavior is long-standing and kept as is.
    pub fn queue_for_tool(&self, tool: &str) -> &str {
        let mut selected = self.default_queue.as_str();
        for queue in &self.queues {
            if queue.name == self.default_queue {
                continue;
            }
            if queue
                .tools
                .iter()
                .any(|t| t.eq_ignore_ascii_case(tool))
            {
                selected = &queue.name;
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(queues: &[(&str, &[&str])]) -> SchedulerConfig {
        SchedulerConfig {
            qsub_binary: SchedulerConfig::default_qsub(),
            qstat_binary: SchedulerConfig::default_qstat(),
            qacct_binary: SchedulerConfig::default_qacct(),
            default_queue: "all.q".to_string(),
            queues: queues
                .iter()
                .map(|(name, tools)| QueueConfig {
                    name: name.to_string(),
                    tools: tools.iter().map(|t| t.to_string()).collect(),
                })
                .collect(),
            probe_timeout_secs: 10,
        }
    }

    #[test]
    fn unclaimed_tool_goes_to_the_default_queue() {
        let config = config(&[("fast.q", &["bwa"])]);
        k9::assert_equal!(config.queue_for_tool("samtools"), "all.q");
    }

    #[test]
    fn tool_match_is_case_insensitive() {
        let config = config(&[("fast.q", &["BWA"])]);
        k9::assert_equal!(config.queue_for_tool("bwa"), "fast.q");
    }

    #[test]
    fn queue_for_tool_last_match_wins() {
        // two non-default queues both claim gatk; iterate-and-overwrite
        // means the later one is selected
        let config = config(&[("fast.q", &["gatk"]), ("himem.q", &["gatk"])]);
        k9::assert_equal!(config.queue_for_tool("gatk"), "himem.q");
    }

    #[test]
    fn the_default_queue_never_claims_a_tool() {
        // a tools list on the default queue is ignored by selection
        let config = config(&[("all.q", &["bwa"]), ("fast.q", &["bwa"])]);
        k9::assert_equal!(config.queue_for_tool("bwa"), "fast.q");
    }

    #[test]
    fn probe_timeout_is_capped() {
        let mut config = config(&[]);
        config.probe_timeout_secs = 120;
        k9::assert_equal!(config.probe_timeout(), Duration::from_secs(30));
        config.probe_timeout_secs = 5;
        k9::assert_equal!(config.probe_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn config_parses_from_toml_with_defaults() {
        let config: SchedulerConfig = toml::from_str(
            r#"
            default_queue = "all.q"

            [[queues]]
            name = "fast.q"
            tools = ["bwa"]
            "#,
        )
        .unwrap();
        k9::assert_equal!(config.qsub_binary, "qsub");
        k9::assert_equal!(config.probe_timeout_secs, 10);
        k9::assert_equal!(config.queue_for_tool("bwa"), "fast.q");
    }
}
