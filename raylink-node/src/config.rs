//! Configuration for a relay node.

use std::path::Path;
use std::time::Duration;

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use raylink_core::network::HEARTBEAT_INTERVAL;
use raylink_core::{
    AnchorPose, AnchorTable, ConnectionInfo, LayerMask, PinholeCamera, RelayError, SceneMesh,
    SessionRole, Shape, TrackedAnchor,
};
use raylink_core::spatial::Collider;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Which side of the relay this process runs.
    pub node: NodeSection,
    /// Network settings.
    pub network: NetworkConfig,
    /// Capture-side settings; ignored by display nodes.
    pub capture: CaptureConfig,
    /// Display-side settings; ignored by capture nodes.
    pub display: DisplayConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// "capture" or "display".
    pub role: SessionRole,
    /// Name announced to the capture node in the hello.
    pub name: String,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Capture nodes bind this address; display nodes connect to it.
    pub host: String,
    pub port: u16,
    /// Seconds between keep-alive packets.
    pub heartbeat_secs: u64,
}

/// Capture-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Image target the rays are expressed against.
    pub target_id: String,
    /// World position of that target on this device.
    pub anchor: Vec3,
    pub camera: PinholeCamera,
    /// Input sampling period in milliseconds.
    pub tick_ms: u64,
    /// How long a capture waits for replies before it is dropped from
    /// tracking. 0 disables expiry.
    pub reply_timeout_ms: u64,
}

/// Display-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Collider layers rays are tested against, by name.
    pub layers: Vec<String>,
    /// Optional cap on query distance in metres.
    pub max_distance: Option<f32>,
    pub anchors: Vec<AnchorEntry>,
    pub colliders: Vec<ColliderEntry>,
}

/// An image target's world position on the display device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorEntry {
    pub target_id: String,
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColliderEntry {
    pub label: String,
    #[serde(default = "default_collider_layer")]
    pub layer: String,
    #[serde(flatten)]
    pub shape: Shape,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive, e.g. "info" or "raylink_core=debug".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

fn default_collider_layer() -> String {
    "spatial_mesh".into()
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            role: SessionRole::Display,
            name: "raylink-node".into(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 7400,
            heartbeat_secs: HEARTBEAT_INTERVAL.as_secs(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_id: "poster".into(),
            anchor: Vec3::new(0.0, 0.0, 1.0),
            camera: PinholeCamera {
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                vertical_fov_deg: 60.0,
                viewport: Vec2::new(1080.0, 2340.0),
            },
            tick_ms: 16,
            reply_timeout_ms: 5_000,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            layers: vec![default_collider_layer()],
            max_distance: None,
            anchors: vec![AnchorEntry {
                target_id: "poster".into(),
                position: Vec3::new(0.0, 0.0, 1.0),
            }],
            colliders: vec![ColliderEntry {
                label: "Wall".into(),
                layer: default_collider_layer(),
                shape: Shape::Box {
                    center: Vec3::new(0.0, 0.0, 4.0),
                    half_extents: Vec3::new(2.5, 1.5, 0.05),
                },
            }],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo::new(self.network.host.clone(), self.network.port)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.network.heartbeat_secs.max(1))
    }
}

impl CaptureConfig {
    pub fn tracked_anchor(&self) -> TrackedAnchor {
        TrackedAnchor::new(self.target_id.clone(), AnchorPose::at(self.anchor))
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        (self.reply_timeout_ms > 0).then(|| Duration::from_millis(self.reply_timeout_ms))
    }

    /// Anchors known on this device, for placing replies in world space.
    pub fn anchor_table(&self) -> AnchorTable {
        AnchorTable::new().with(self.target_id.clone(), AnchorPose::at(self.anchor))
    }
}

impl DisplayConfig {
    pub fn layer_mask(&self) -> Result<LayerMask, RelayError> {
        LayerMask::parse_names(&self.layers)
    }

    pub fn anchor_table(&self) -> AnchorTable {
        self.anchors.iter().fold(AnchorTable::new(), |table, entry| {
            table.with(entry.target_id.clone(), AnchorPose::at(entry.position))
        })
    }

    /// Build the scene, rejecting colliders on unknown layers.
    pub fn scene_mesh(&self) -> Result<SceneMesh, RelayError> {
        let mut mesh = match self.max_distance {
            Some(max) if max > 0.0 => SceneMesh::new().with_max_distance(max),
            Some(max) => {
                return Err(RelayError::Config(format!(
                    "max_distance must be positive, got {max}"
                )));
            }
            None => SceneMesh::new(),
        };
        for entry in &self.colliders {
            mesh.add(Collider {
                label: entry.label.clone(),
                layer: LayerMask::parse_name(&entry.layer)?,
                shape: entry.shape.clone(),
            });
        }
        Ok(mesh)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&NodeConfig::default()).unwrap();
        assert!(text.contains("role = \"display\""));
        assert!(text.contains("reply_timeout_ms"));
        assert!(text.contains("shape = \"box\""));
    }

    #[test]
    fn roundtrip_config() {
        let cfg = NodeConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: NodeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.network.port, 7400);
        assert_eq!(parsed.node.role, SessionRole::Display);
        assert_eq!(parsed.display.colliders, cfg.display.colliders);
        assert_eq!(parsed.capture.camera, cfg.capture.camera);
    }

    #[test]
    fn written_default_loads_back() {
        let path = std::env::temp_dir().join(format!("raylink-node-{}.toml", std::process::id()));
        NodeConfig::write_default(&path).unwrap();
        let loaded = NodeConfig::load(&path);
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.network.port, 7400);
        assert_eq!(loaded.capture.target_id, "poster");
        assert_eq!(loaded.display.colliders, NodeConfig::default().display.colliders);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: NodeConfig = toml::from_str(
            r#"
            [node]
            role = "capture"

            [display]
            layers = ["default", "spatial_mesh"]

            [[display.colliders]]
            label = "Floor"
            shape = "triangle"
            a = [-5.0, 0.0, -5.0]
            b = [5.0, 0.0, -5.0]
            c = [0, 0, 5]
            "#,
        )
        .unwrap();
        assert_eq!(parsed.node.role, SessionRole::Capture);
        assert_eq!(parsed.node.name, "raylink-node");
        assert_eq!(parsed.network.port, 7400);
        assert_eq!(
            parsed.display.layer_mask().unwrap(),
            LayerMask::DEFAULT | LayerMask::SPATIAL_MESH
        );

        let mesh = parsed.display.scene_mesh().unwrap();
        assert_eq!(mesh.len(), 1);
        assert_eq!(mesh.colliders()[0].layer, LayerMask::SPATIAL_MESH);
        assert!(matches!(mesh.colliders()[0].shape, Shape::Triangle { .. }));
    }

    #[test]
    fn unknown_layer_is_rejected() {
        let mut cfg = DisplayConfig::default();
        cfg.colliders[0].layer = "walls".into();
        assert!(matches!(cfg.scene_mesh(), Err(RelayError::Config(_))));

        cfg.layers = vec!["nope".into()];
        assert!(cfg.layer_mask().is_err());
    }

    #[test]
    fn zero_reply_timeout_disables_expiry() {
        let mut cfg = CaptureConfig::default();
        assert_eq!(cfg.reply_timeout(), Some(Duration::from_secs(5)));
        cfg.reply_timeout_ms = 0;
        assert_eq!(cfg.reply_timeout(), None);
    }

    #[test]
    fn anchor_tables_follow_config() {
        let cfg = NodeConfig::default();
        let display = cfg.display.anchor_table();
        assert_eq!(display.get("poster"), Some(AnchorPose::at(Vec3::new(0.0, 0.0, 1.0))));
        assert_eq!(cfg.capture.anchor_table().len(), 1);
        assert_eq!(cfg.capture.tracked_anchor().target_id, "poster");
    }
}
