// src/config/config_manager.rs

use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::RwLock;

fn default_enabled() -> bool {
    true
}

/// 单个合作方的注册配置
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PartnerConfig {
    pub code: String,
    /// 不填则使用该合作方 adapter 的默认地址
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

pub trait ConfigAdapter: Send + Sync {
    fn get_partner_configs(&self) -> Vec<PartnerConfig>;
}

/// 从 /static 目录读取合作方注册表
pub struct FileConfigAdapter {
    pub partner_file: String,
}

impl FileConfigAdapter {
    pub fn new(partner_file: &str) -> Self {
        Self {
            partner_file: partner_file.to_string(),
        }
    }
}

impl ConfigAdapter for FileConfigAdapter {
    fn get_partner_configs(&self) -> Vec<PartnerConfig> {
        let content = fs::read_to_string(&self.partner_file).unwrap_or_else(|_| "[]".to_string());
        serde_json::from_str(&content).unwrap_or_default()
    }
}

/// 全局配置：对外回跳地址 + 合作方注册表
#[derive(Debug)]
pub struct ConfigManager {
    pub external_url: String,
    partners: RwLock<Vec<PartnerConfig>>,
}

impl ConfigManager {
    pub fn new(external_url: &str) -> Self {
        Self {
            external_url: external_url.to_string(),
            partners: RwLock::new(Vec::new()),
        }
    }

    pub fn update_partners(&self, partners: Vec<PartnerConfig>) {
        *self.partners.write().unwrap() = partners;
    }

    pub fn active_partners(&self) -> Vec<PartnerConfig> {
        self.partners
            .read()
            .unwrap()
            .iter()
            .filter(|p| p.enabled)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_registry_file_yields_empty_config() {
        let adapter = FileConfigAdapter::new("static/definitely_missing.json");
        assert!(adapter.get_partner_configs().is_empty());
    }

    #[test]
    fn only_enabled_partners_are_active() {
        let manager = ConfigManager::new("http://hbs.example.com");
        manager.update_partners(
            serde_json::from_str(
                r#"[
                    {"code": "xhb", "endpoint": "http://127.0.0.1:9001/openrtb2"},
                    {"code": "dormant", "enabled": false}
                ]"#,
            )
            .unwrap(),
        );
        let active = manager.active_partners();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].code, "xhb");
    }
}
