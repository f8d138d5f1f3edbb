//! ボリューム定義

/// マウント種別
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MountKind {
    #[default]
    Volume,
    Bind,
    Tmpfs,
}

/// サービスのボリュームマウント
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceVolume {
    pub kind: MountKind,
    /// ボリューム名またはホストパス。匿名ボリュームでは None
    pub source: Option<String>,
    pub target: String,
    pub read_only: bool,
}
