//! Connection parameters and the per-role legality table.
//!
//! Every tunable is a signed integer identified by a [`Param`]. Which ones a
//! session may read or write depends on its [`Role`] and on whether it is
//! connected; [`access`] is the single static lookup for that.
//!
//! # Client role
//!
//! | Param | Read | Set before connect | Set after connect | Default |
//! |-------|:----:|:------------------:|:-----------------:|--------:|
//! | RemotePort | ✓ | ✓ | ✗ | 102 |
//! | PingTimeout | ✓ | ✓ | ✓ | 750 |
//! | SendTimeout | ✓ | ✓ | ✓ | 10 |
//! | RecvTimeout | ✓ | ✓ | ✓ | 3000 |
//! | SrcRef | ✓ | ✓ | ✓ | 256 |
//! | DstRef | ✓ | ✓ | ✓ | 0 |
//! | SrcTSap | ✓ | ✓ | ✓ | 256 |
//! | PduRequest | ✓ | ✓ | ✓ | 480 |
//!
//! LocalPort, WorkInterval, MaxClients, BSendTimeout, BRecvTimeout,
//! RecoveryTime and KeepAliveTime are illegal for a client.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::error::{Result, S7Error};

/// Default S7 (ISO-on-TCP) port.
pub const DEFAULT_S7_PORT: u16 = 102;

/// Tunable connection parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Param {
    /// Local listening port (server/partner).
    LocalPort,
    /// Remote TCP port.
    RemotePort,
    /// Ping timeout (ms).
    PingTimeout,
    /// Send timeout (ms).
    SendTimeout,
    /// Receive timeout (ms).
    RecvTimeout,
    /// Worker interval (ms).
    WorkInterval,
    /// ISO source reference.
    SrcRef,
    /// ISO destination reference.
    DstRef,
    /// ISO source TSAP.
    SrcTSap,
    /// PDU size requested at negotiation.
    PduRequest,
    /// Maximum number of clients (server).
    MaxClients,
    /// Block send timeout (partner, ms).
    BSendTimeout,
    /// Block receive timeout (partner, ms).
    BRecvTimeout,
    /// Reconnection recovery time (partner, ms).
    RecoveryTime,
    /// TCP keep-alive time (partner, ms).
    KeepAliveTime,
}

impl Param {
    /// All parameters in native id order.
    pub const ALL: [Param; 15] = [
        Param::LocalPort,
        Param::RemotePort,
        Param::PingTimeout,
        Param::SendTimeout,
        Param::RecvTimeout,
        Param::WorkInterval,
        Param::SrcRef,
        Param::DstRef,
        Param::SrcTSap,
        Param::PduRequest,
        Param::MaxClients,
        Param::BSendTimeout,
        Param::BRecvTimeout,
        Param::RecoveryTime,
        Param::KeepAliveTime,
    ];

    /// Returns the native parameter number (1-15).
    pub fn id(self) -> i32 {
        match self {
            Param::LocalPort => 1,
            Param::RemotePort => 2,
            Param::PingTimeout => 3,
            Param::SendTimeout => 4,
            Param::RecvTimeout => 5,
            Param::WorkInterval => 6,
            Param::SrcRef => 7,
            Param::DstRef => 8,
            Param::SrcTSap => 9,
            Param::PduRequest => 10,
            Param::MaxClients => 11,
            Param::BSendTimeout => 12,
            Param::BRecvTimeout => 13,
            Param::RecoveryTime => 14,
            Param::KeepAliveTime => 15,
        }
    }

    /// Looks a parameter up by native number.
    ///
    /// ```
    /// use s7_session::Param;
    ///
    /// assert_eq!(Param::from_id(2), Some(Param::RemotePort));
    /// assert_eq!(Param::from_id(16), None);
    /// ```
    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id)
    }

    /// Returns the documented value range.
    pub fn range(self) -> RangeInclusive<i32> {
        match self {
            Param::LocalPort | Param::RemotePort => 1..=65535,
            Param::SrcRef | Param::DstRef | Param::SrcTSap => 0..=65535,
            Param::PduRequest => 240..=960,
            Param::MaxClients => 1..=1024,
            Param::PingTimeout
            | Param::SendTimeout
            | Param::RecvTimeout
            | Param::WorkInterval
            | Param::BSendTimeout
            | Param::BRecvTimeout
            | Param::RecoveryTime
            | Param::KeepAliveTime => 0..=i32::MAX,
        }
    }

    /// Returns the value a fresh session reports before any override.
    pub fn default_value(self) -> i32 {
        match self {
            Param::LocalPort | Param::RemotePort => i32::from(DEFAULT_S7_PORT),
            Param::PingTimeout => 750,
            Param::SendTimeout => 10,
            Param::RecvTimeout => 3000,
            Param::WorkInterval => 100,
            Param::SrcRef => 256,
            Param::DstRef => 0,
            Param::SrcTSap => 256,
            Param::PduRequest => 480,
            Param::MaxClients => 1024,
            Param::BSendTimeout | Param::BRecvTimeout => 3000,
            Param::RecoveryTime => 500,
            Param::KeepAliveTime => 5000,
        }
    }
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Session role; decides which parameters are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Active client.
    Client,
    /// Server.
    Server,
    /// Peer-to-peer partner.
    Partner,
}

/// What a role may do with a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    /// Parameter may be read.
    pub read: bool,
    /// Parameter may be set while disconnected (staged).
    pub set_before_connect: bool,
    /// Parameter may be set on a live connection.
    pub set_after_connect: bool,
}

const NONE: Access = Access {
    read: false,
    set_before_connect: false,
    set_after_connect: false,
};
const STAGED: Access = Access {
    read: true,
    set_before_connect: true,
    set_after_connect: false,
};
const LIVE: Access = Access {
    read: true,
    set_before_connect: true,
    set_after_connect: true,
};

/// Static legality lookup keyed by (role, parameter).
pub fn access(role: Role, param: Param) -> Access {
    use Param::*;

    match (role, param) {
        (Role::Client, RemotePort) => STAGED,
        (
            Role::Client,
            PingTimeout | SendTimeout | RecvTimeout | SrcRef | DstRef | SrcTSap | PduRequest,
        ) => LIVE,

        (Role::Server, LocalPort | MaxClients) => STAGED,
        (Role::Server, WorkInterval) => LIVE,

        (Role::Partner, LocalPort | RemotePort) => STAGED,
        (
            Role::Partner,
            PingTimeout | SendTimeout | RecvTimeout | SrcRef | DstRef | BSendTimeout
            | BRecvTimeout | RecoveryTime | KeepAliveTime,
        ) => LIVE,

        _ => NONE,
    }
}

/// Parameter values of one session.
///
/// Holds the caller's overrides. While disconnected they answer `get` and are
/// replayed to the engine on every connect; once connected, the engine is the
/// source of truth and the session forwards gets and sets.
#[derive(Debug, Clone)]
pub struct ParamStore {
    role: Role,
    overrides: BTreeMap<Param, i32>,
}

impl ParamStore {
    /// Creates an empty store for `role`.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            overrides: BTreeMap::new(),
        }
    }

    /// Returns the role this store validates against.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Checks that `param` may be read.
    pub fn check_get(&self, param: Param) -> Result<()> {
        if access(self.role, param).read {
            Ok(())
        } else {
            Err(S7Error::param_not_supported(
                param,
                format!("not available for {:?} role", self.role),
            ))
        }
    }

    /// Checks that `param` may be set to `value` in the given state.
    ///
    /// # Errors
    ///
    /// - `ParamNotSupported` if illegal for the role, or not settable on a
    ///   live connection while `connected`
    /// - `InvalidParamValue` if `value` is outside [`Param::range`]
    pub fn check_set(&self, param: Param, value: i32, connected: bool) -> Result<()> {
        let rights = access(self.role, param);
        if !rights.set_before_connect && !rights.set_after_connect {
            return Err(S7Error::param_not_supported(
                param,
                format!("not available for {:?} role", self.role),
            ));
        }
        if connected && !rights.set_after_connect {
            return Err(S7Error::param_not_supported(
                param,
                "can only be changed before connecting",
            ));
        }
        if !param.range().contains(&value) {
            return Err(S7Error::InvalidParamValue { param, value });
        }
        Ok(())
    }

    /// Returns the locally known value: the override, or the default.
    pub fn get_local(&self, param: Param) -> Result<i32> {
        self.check_get(param)?;
        Ok(self.value(param))
    }

    /// Validates and records an override while disconnected.
    pub fn stage(&mut self, param: Param, value: i32) -> Result<()> {
        self.check_set(param, value, false)?;
        self.overrides.insert(param, value);
        Ok(())
    }

    /// Records a value the engine accepted on a live connection.
    pub(crate) fn record(&mut self, param: Param, value: i32) {
        self.overrides.insert(param, value);
    }

    /// Returns the override of `param`, or its default.
    pub(crate) fn value(&self, param: Param) -> i32 {
        self.overrides
            .get(&param)
            .copied()
            .unwrap_or_else(|| param.default_value())
    }

    /// Iterates the overrides to replay at connect, in native id order.
    pub fn overrides(&self) -> impl Iterator<Item = (Param, i32)> + '_ {
        self.overrides.iter().map(|(p, v)| (*p, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const CLIENT_ILLEGAL: [Param; 7] = [
        Param::LocalPort,
        Param::WorkInterval,
        Param::MaxClients,
        Param::BSendTimeout,
        Param::BRecvTimeout,
        Param::RecoveryTime,
        Param::KeepAliveTime,
    ];

    #[test]
    fn test_ids_roundtrip() {
        for (i, param) in Param::ALL.iter().enumerate() {
            assert_eq!(param.id(), i as i32 + 1);
            assert_eq!(Param::from_id(param.id()), Some(*param));
        }
        assert_eq!(Param::from_id(0), None);
    }

    #[test]
    fn test_client_defaults() {
        let store = ParamStore::new(Role::Client);
        let expected = [
            (Param::RemotePort, 102),
            (Param::PingTimeout, 750),
            (Param::SendTimeout, 10),
            (Param::RecvTimeout, 3000),
            (Param::SrcRef, 256),
            (Param::DstRef, 0),
            (Param::SrcTSap, 256),
            (Param::PduRequest, 480),
        ];
        for (param, value) in expected {
            assert_eq!(store.get_local(param).unwrap(), value, "{param}");
        }
    }

    #[test]
    fn test_client_illegal_params() {
        let mut store = ParamStore::new(Role::Client);
        for param in CLIENT_ILLEGAL {
            assert_eq!(
                store.get_local(param).unwrap_err().kind(),
                ErrorKind::ParamNotSupported
            );
            assert_eq!(
                store.stage(param, 5000).unwrap_err().kind(),
                ErrorKind::ParamNotSupported
            );
            assert_eq!(
                store.check_set(param, 5000, true).unwrap_err().kind(),
                ErrorKind::ParamNotSupported
            );
        }
    }

    #[test]
    fn test_remote_port_staged_only() {
        let mut store = ParamStore::new(Role::Client);
        store.stage(Param::RemotePort, 1102).unwrap();
        assert_eq!(store.get_local(Param::RemotePort).unwrap(), 1102);

        let err = store.check_set(Param::RemotePort, 1, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParamNotSupported);
        assert!(store.check_set(Param::PingTimeout, 800, true).is_ok());
    }

    #[test]
    fn test_value_ranges() {
        let mut store = ParamStore::new(Role::Client);
        let cases = [
            (Param::RemotePort, 0),
            (Param::RemotePort, 65536),
            (Param::PduRequest, 100),
            (Param::PduRequest, 2048),
            (Param::RecvTimeout, -1),
        ];
        for (param, value) in cases {
            assert_eq!(
                store.stage(param, value).unwrap_err(),
                S7Error::InvalidParamValue { param, value }
            );
        }
        assert!(store.stage(Param::PduRequest, 470).is_ok());
    }

    #[test]
    fn test_overrides_in_id_order() {
        let mut store = ParamStore::new(Role::Client);
        store.stage(Param::PduRequest, 470).unwrap();
        store.stage(Param::RemotePort, 1102).unwrap();
        let staged: Vec<_> = store.overrides().collect();
        assert_eq!(
            staged,
            vec![(Param::RemotePort, 1102), (Param::PduRequest, 470)]
        );
    }

    #[test]
    fn test_server_and_partner_tables() {
        assert!(access(Role::Server, Param::LocalPort).read);
        assert!(!access(Role::Server, Param::LocalPort).set_after_connect);
        assert!(access(Role::Server, Param::WorkInterval).set_after_connect);
        assert_eq!(access(Role::Server, Param::RemotePort), NONE);

        assert!(access(Role::Partner, Param::KeepAliveTime).set_after_connect);
        assert_eq!(access(Role::Partner, Param::MaxClients), NONE);
    }
}
