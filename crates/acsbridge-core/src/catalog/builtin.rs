// Built-in catalog table.
//
// TR-181 (`Device.`) candidates come first, then TR-098
// (`InternetGatewayDevice.`). Wi-Fi keys are generated per band from the
// instance numbers each vendor family uses for that band.

use super::{CatalogEntry, Category, PathCandidate};
use crate::codec::{ValueSpec, WireType};
use crate::model::{DataModel, LogicalKey};

const IGD: &str = "InternetGatewayDevice";
const IGD_WAN: &str = "InternetGatewayDevice.WANDevice.1";
const IGD_PPP: &str = "InternetGatewayDevice.WANDevice.1.WANConnectionDevice.1.WANPPPConnection.1";
const IGD_IP: &str = "InternetGatewayDevice.WANDevice.1.WANConnectionDevice.1.WANIPConnection.1";
const IGD_LAN: &str = "InternetGatewayDevice.LANDevice.1.LANHostConfigManagement";
const IGD_WLAN: &str = "InternetGatewayDevice.LANDevice.1.WLANConfiguration";

fn tr181(path: impl Into<String>) -> PathCandidate {
    PathCandidate::new(path, DataModel::Tr181)
}

fn tr098(path: impl Into<String>) -> PathCandidate {
    PathCandidate::new(path, DataModel::Tr098)
}

struct Def {
    key: String,
    category: Category,
    label: String,
    value: ValueSpec,
    read: Vec<PathCandidate>,
}

impl Def {
    fn new(key: impl Into<String>, category: Category, label: impl Into<String>, wire_type: WireType) -> Self {
        Self {
            key: key.into(),
            category,
            label: label.into(),
            value: ValueSpec::new(wire_type),
            read: Vec::new(),
        }
    }

    fn spec(mut self, value: ValueSpec) -> Self {
        self.value = value;
        self
    }

    fn paths(mut self, read: Vec<PathCandidate>) -> Self {
        self.read = read;
        self
    }

    fn build(self, write: Vec<PathCandidate>) -> CatalogEntry {
        CatalogEntry {
            key: LogicalKey::from(self.key),
            category: self.category,
            label: self.label,
            value: self.value,
            read: self.read,
            write,
        }
    }

    fn read_only(self) -> CatalogEntry {
        self.build(Vec::new())
    }

    /// Writes go to the same candidates, in the same order.
    fn writable(self) -> CatalogEntry {
        let write = self.read.clone();
        self.build(write)
    }
}

// ── Device info ─────────────────────────────────────────────────────

fn device_info() -> Vec<CatalogEntry> {
    [
        ("manufacturer", "Manufacturer", "Manufacturer", WireType::String, None),
        ("model", "Model", "ModelName", WireType::String, None),
        ("serial", "Serial number", "SerialNumber", WireType::String, None),
        ("firmware", "Firmware version", "SoftwareVersion", WireType::String, Some("FirmwareVersion")),
        ("hardware", "Hardware version", "HardwareVersion", WireType::String, None),
        ("uptime", "Uptime (s)", "UpTime", WireType::UnsignedInt, None),
    ]
    .into_iter()
    .map(|(key, label, field, wire_type, legacy_alias)| {
        let mut paths = vec![
            tr181(format!("Device.DeviceInfo.{field}")),
            tr098(format!("{IGD}.DeviceInfo.{field}")),
        ];
        if let Some(alias) = legacy_alias {
            paths.push(tr098(format!("{IGD}.DeviceInfo.{alias}")));
        }
        Def::new(key, Category::Device, label, wire_type)
            .paths(paths)
            .read_only()
    })
    .collect()
}

// ── WAN ─────────────────────────────────────────────────────────────

/// PPPoE session candidates. Zyxel TR-181 firmware runs the session on
/// `PPP.Interface.2`; ZTE moves it to the second connection or the second
/// connection device.
fn ppp_paths(tr181_field: &str, tr098_field: &str) -> Vec<PathCandidate> {
    vec![
        tr181(format!("Device.PPP.Interface.1.{tr181_field}")),
        tr181(format!("Device.PPP.Interface.2.{tr181_field}")).vendor("zyxel"),
        tr098(format!("{IGD_PPP}.{tr098_field}")),
        tr098(format!("{IGD_WAN}.WANConnectionDevice.1.WANPPPConnection.2.{tr098_field}")).vendor("zte"),
        tr098(format!("{IGD_WAN}.WANConnectionDevice.2.WANPPPConnection.1.{tr098_field}")).vendor("zte"),
    ]
}

fn wan() -> Vec<CatalogEntry> {
    vec![
        Def::new("wan_ppp_username", Category::Wan, "PPPoE username", WireType::String)
            .paths(ppp_paths("Username", "Username"))
            .writable(),
        Def::new("wan_ppp_password", Category::Wan, "PPPoE password", WireType::String)
            .paths(ppp_paths("Password", "Password"))
            .writable(),
        Def::new("wan_ppp_status", Category::Wan, "PPPoE status", WireType::String)
            .paths(ppp_paths("Status", "ConnectionStatus"))
            .read_only(),
        // Zyxel's PPP.Interface.2 address also shows on IP.Interface.3.
        Def::new("wan_ip_address", Category::Wan, "WAN IPv4 address", WireType::String)
            .paths(vec![
                tr181("Device.PPP.Interface.1.IPCP.LocalIPAddress"),
                tr181("Device.IP.Interface.1.IPv4Address.1.IPAddress"),
                tr181("Device.IP.Interface.3.IPv4Address.1.IPAddress").vendor("zyxel-tp-link"),
                tr098(format!("{IGD_PPP}.ExternalIPAddress")),
                tr098(format!("{IGD_WAN}.WANConnectionDevice.1.WANPPPConnection.2.ExternalIPAddress")).vendor("zte"),
                tr098(format!("{IGD_IP}.ExternalIPAddress")),
            ])
            .read_only(),
        Def::new("wan_gateway", Category::Wan, "Default gateway", WireType::String)
            .paths(vec![
                tr181("Device.Routing.Router.1.IPv4Forwarding.1.GatewayIPAddress"),
                tr098(format!("{IGD_IP}.DefaultGateway")),
                tr098(format!("{IGD_PPP}.RemoteIPAddress")),
            ])
            .read_only(),
        Def::new("wan_dns", Category::Wan, "WAN DNS servers", WireType::String)
            .paths(vec![
                tr181("Device.DNS.Client.Server.1.DNSServer"),
                tr098(format!("{IGD_PPP}.DNSServers")),
                tr098(format!("{IGD_IP}.DNSServers")),
            ])
            .writable(),
        Def::new("wan_ipv6_enable", Category::Wan, "IPv6 enabled", WireType::Boolean)
            .paths(vec![
                tr181("Device.IP.Interface.1.IPv6Enable"),
                tr098(format!("{IGD_PPP}.X_TPLINK_IPv6Enable")).vendor("tp-link"),
            ])
            .writable(),
    ]
}

// ── LAN / DHCP ──────────────────────────────────────────────────────

fn lan() -> Vec<CatalogEntry> {
    let pool = "Device.DHCPv4.Server.Pool.1";
    vec![
        Def::new("lan_ip", Category::Lan, "LAN IP address", WireType::String)
            .paths(vec![
                tr181("Device.IP.Interface.2.IPv4Address.1.IPAddress"),
                tr098(format!("{IGD_LAN}.IPInterface.1.IPInterfaceIPAddress")),
                tr098(format!("{IGD_LAN}.IPAddress")),
            ])
            .writable(),
        Def::new("lan_mask", Category::Lan, "LAN subnet mask", WireType::String)
            .paths(vec![
                tr181("Device.IP.Interface.2.IPv4Address.1.SubnetMask"),
                tr098(format!("{IGD_LAN}.IPInterface.1.IPInterfaceSubnetMask")),
                tr098(format!("{IGD_LAN}.SubnetMask")),
            ])
            .writable(),
        Def::new("lan_dhcp_enable", Category::Lan, "DHCP server enabled", WireType::Boolean)
            .paths(vec![
                tr181(format!("{pool}.Enable")),
                tr098(format!("{IGD_LAN}.DHCPServerEnable")),
            ])
            .writable(),
        Def::new("lan_dhcp_start", Category::Lan, "DHCP pool start", WireType::String)
            .paths(vec![
                tr181(format!("{pool}.MinAddress")),
                tr098(format!("{IGD_LAN}.MinAddress")),
            ])
            .writable(),
        Def::new("lan_dhcp_end", Category::Lan, "DHCP pool end", WireType::String)
            .paths(vec![
                tr181(format!("{pool}.MaxAddress")),
                tr098(format!("{IGD_LAN}.MaxAddress")),
            ])
            .writable(),
        Def::new("lan_dhcp_lease", Category::Lan, "DHCP lease time (s)", WireType::Int)
            .paths(vec![
                tr181(format!("{pool}.LeaseTime")),
                tr098(format!("{IGD_LAN}.DHCPLeaseTime")),
            ])
            .writable(),
        Def::new("lan_dhcp_dns", Category::Lan, "DHCP DNS servers", WireType::String)
            .paths(vec![
                tr181(format!("{pool}.DNSServers")),
                tr098(format!("{IGD_LAN}.DNSServers")),
            ])
            .writable(),
    ]
}

// ── Wi-Fi ───────────────────────────────────────────────────────────

/// Instance numbers one band occupies, per generation and vendor family.
struct Band {
    prefix: &'static str,
    name: &'static str,
    tr181: &'static [(u8, Option<&'static str>)],
    tr098: &'static [(u8, Option<&'static str>)],
}

const BAND_24: Band = Band {
    prefix: "wifi_24",
    name: "2.4 GHz",
    tr181: &[(1, None)],
    tr098: &[(1, None)],
};

// Zyxel TR-181 firmware puts the 5 GHz SSID on instance 3. On TR-098,
// ZTE and Huawei use WLANConfiguration.5 and TP-Link uses .2. Instance 3
// is a guest SSID on other TR-181 firmware, so it stays behind instance 2.
const BAND_5: Band = Band {
    prefix: "wifi_5",
    name: "5 GHz",
    tr181: &[(2, None), (3, Some("zyxel"))],
    tr098: &[(5, Some("zte-huawei")), (2, Some("tp-link"))],
};

/// `{i}` in the templates is replaced by the instance number.
fn band_paths(band: &Band, tr181_fields: &[&str], tr098_fields: &[&str]) -> Vec<PathCandidate> {
    let expand = |template: &str, i: u8| template.replace("{i}", &i.to_string());
    let mut out = Vec::new();
    for &(i, variant) in band.tr181 {
        for field in tr181_fields {
            let mut c = tr181(expand(field, i));
            c.variant = variant.map(str::to_owned);
            out.push(c);
        }
    }
    for &(i, variant) in band.tr098 {
        for field in tr098_fields {
            let mut c = tr098(format!("{IGD_WLAN}.{}", expand(field, i)));
            let vendor_field = field.contains("X_TP_");
            c.variant = if vendor_field {
                Some("tp-link".to_owned())
            } else {
                variant.map(str::to_owned)
            };
            out.push(c);
        }
    }
    out
}

fn wifi(band: &Band) -> Vec<CatalogEntry> {
    let key = |suffix: &str| format!("{}_{suffix}", band.prefix);
    let label = |what: &str| format!("Wi-Fi {} {what}", band.name);

    vec![
        Def::new(key("enable"), Category::Wifi, label("enabled"), WireType::Boolean)
            .paths(band_paths(band, &["Device.WiFi.SSID.{i}.Enable"], &["{i}.Enable"]))
            .writable(),
        Def::new(key("ssid"), Category::Wifi, label("SSID"), WireType::String)
            .paths(band_paths(band, &["Device.WiFi.SSID.{i}.SSID"], &["{i}.SSID"]))
            .writable(),
        Def::new(key("password"), Category::Wifi, label("passphrase"), WireType::String)
            .paths(band_paths(
                band,
                &["Device.WiFi.AccessPoint.{i}.Security.KeyPassphrase"],
                &["{i}.KeyPassphrase", "{i}.PreSharedKey.1.PreSharedKey"],
            ))
            .writable(),
        Def::new(key("channel"), Category::Wifi, label("channel"), WireType::UnsignedInt)
            .paths(band_paths(band, &["Device.WiFi.Radio.{i}.Channel"], &["{i}.Channel"]))
            .writable(),
        Def::new(key("auto_channel"), Category::Wifi, label("auto channel"), WireType::Boolean)
            .paths(band_paths(
                band,
                &["Device.WiFi.Radio.{i}.AutoChannelEnable"],
                &["{i}.AutoChannelEnable"],
            ))
            .writable(),
        Def::new(key("hidden"), Category::Wifi, label("hidden SSID"), WireType::Boolean)
            .spec(ValueSpec::new(WireType::Boolean).inverted())
            .paths(band_paths(
                band,
                &["Device.WiFi.AccessPoint.{i}.SSIDAdvertisementEnabled"],
                &["{i}.SSIDAdvertisementEnabled"],
            ))
            .writable(),
        Def::new(key("security_mode"), Category::Wifi, label("security mode"), WireType::String)
            .paths(band_paths(
                band,
                &["Device.WiFi.AccessPoint.{i}.Security.ModeEnabled"],
                &["{i}.BeaconType", "{i}.X_TP_SecurityMode"],
            ))
            .writable(),
        Def::new(key("bandwidth"), Category::Wifi, label("channel width"), WireType::String)
            .spec(ValueSpec::new(WireType::String).one_of(&["20MHz", "40MHz", "80MHz", "160MHz", "Auto"]))
            .paths(band_paths(
                band,
                &["Device.WiFi.Radio.{i}.OperatingChannelBandwidth"],
                &["{i}.X_TP_Bandwidth"],
            ))
            .writable(),
        Def::new(key("tx_power"), Category::Wifi, label("transmit power (%)"), WireType::Int)
            .paths(band_paths(
                band,
                &["Device.WiFi.Radio.{i}.TransmitPower"],
                &["{i}.TransmitPower", "{i}.X_TP_TransmitPower"],
            ))
            .writable(),
        Def::new(key("clients"), Category::Wifi, label("associated clients"), WireType::UnsignedInt)
            .paths(band_paths(
                band,
                &["Device.WiFi.AccessPoint.{i}.AssociatedDeviceNumberOfEntries"],
                &["{i}.TotalAssociations"],
            ))
            .read_only(),
    ]
}

// ── Management server ───────────────────────────────────────────────

fn management() -> Vec<CatalogEntry> {
    [
        ("acs_url", "ACS URL", "URL", WireType::String),
        ("acs_username", "ACS username", "Username", WireType::String),
        ("inform_enable", "Periodic inform", "PeriodicInformEnable", WireType::Boolean),
        ("inform_interval", "Inform interval (s)", "PeriodicInformInterval", WireType::UnsignedInt),
    ]
    .into_iter()
    .map(|(key, label, field, wire_type)| {
        Def::new(key, Category::Management, label, wire_type)
            .paths(vec![
                tr181(format!("Device.ManagementServer.{field}")),
                tr098(format!("{IGD}.ManagementServer.{field}")),
            ])
            .writable()
    })
    .collect()
}

pub(super) fn entries() -> Vec<CatalogEntry> {
    let mut all = device_info();
    all.extend(wan());
    all.extend(lan());
    all.extend(wifi(&BAND_24));
    all.extend(wifi(&BAND_5));
    all.extend(management());
    all
}
