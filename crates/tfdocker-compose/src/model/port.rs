//! ポート定義

/// プロトコル種別
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
    Sctp,
}

impl Protocol {
    /// 文字列からパース。不明な値は tcp とみなす
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "udp" => Protocol::Udp,
            "sctp" => Protocol::Sctp,
            _ => Protocol::Tcp,
        }
    }

    /// Docker API で使用する文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Sctp => "sctp",
        }
    }
}

/// サービスのポート公開設定
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortMapping {
    pub host_ip: Option<String>,
    /// ホスト側ポート。None なら公開せず expose のみ
    pub published: Option<String>,
    pub target: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    /// Docker API のポートキー（例: "80/tcp"）
    pub fn port_key(&self) -> String {
        format!("{}/{}", self.target, self.protocol.as_str())
    }
}
