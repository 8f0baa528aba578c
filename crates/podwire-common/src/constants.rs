//! Protocol constants, interface naming rules, and default settings.

/// CNI specification versions this plugin accepts.
pub const SUPPORTED_CNI_VERSIONS: &[&str] = &["0.1.0", "0.2.0", "0.3.0", "0.3.1"];

/// CNI version reported when the configuration does not name one.
pub const DEFAULT_CNI_VERSION: &str = "0.3.1";

/// Default base URL of the control daemon API.
pub const DEFAULT_DAEMON_URL: &str = "http://127.0.0.1:9876/v1";

/// Default bound on establishing a daemon connection, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Log filter used when `PODWIRE_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "debug";

/// Environment variable overriding the daemon URL.
pub const ENV_DAEMON_URL: &str = "PODWIRE_DAEMON_URL";
/// Environment variable overriding the connect timeout.
pub const ENV_CONNECT_TIMEOUT: &str = "PODWIRE_CONNECT_TIMEOUT_SECS";
/// Environment variable setting an overall request timeout.
pub const ENV_REQUEST_TIMEOUT: &str = "PODWIRE_REQUEST_TIMEOUT_SECS";
/// Environment variable holding the log filter directive.
pub const ENV_LOG_FILTER: &str = "PODWIRE_LOG";

/// Prefix of the endpoint identifier derived from a container id.
pub const ENDPOINT_ID_PREFIX: &str = "container-id";

/// Prefix of host-side paired-link device names.
pub const HOST_INTERFACE_PREFIX: &str = "lxc";

/// Prefix of temporary device names before they reach the sandbox.
pub const TEMP_INTERFACE_PREFIX: &str = "tmp";

/// Kernel interface name buffer size, including the terminating NUL.
pub const IFNAMSIZ: usize = 16;

/// Network name under which an upstream bridging plugin runs first.
pub const BRIDGE_NETWORK_NAME: &str = "cbr0";

/// Label source for scheduler-provided labels.
pub const LABEL_SOURCE_MESOS: &str = "mesos";

/// Sysctl toggling IPv6 processing on every interface of a namespace.
pub const IPV6_DISABLE_ALL_SYSCTL: &str = "/proc/sys/net/ipv6/conf/all/disable_ipv6";

/// Root of the per-interface IPv4 sysctl tree.
pub const IPV4_CONF_SYSCTL_ROOT: &str = "/proc/sys/net/ipv4/conf";
