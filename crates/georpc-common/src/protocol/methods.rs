//! The geo service method vocabulary.

use std::fmt;

/// Service path shared by every geo method.
pub const GEO_SERVICE: &str = "geo.v1.Geo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeoMethod {
    GeoLocate,
    GetGeoRoute,
    GetAddressRoute,
    AddGeoLocation,
    AddGeoLocationLatLong,
    GetGeoLocation,
    GetGeoLocations,
    DeleteGeoLocation,
    AddAddress,
    UpdateAddress,
    GetAddress,
    GetAddresses,
    GetAddressesByIds,
    DeleteAddress,
    GetServers,
}

impl GeoMethod {
    pub const ALL: [GeoMethod; 15] = [
        GeoMethod::GeoLocate,
        GeoMethod::GetGeoRoute,
        GeoMethod::GetAddressRoute,
        GeoMethod::AddGeoLocation,
        GeoMethod::AddGeoLocationLatLong,
        GeoMethod::GetGeoLocation,
        GeoMethod::GetGeoLocations,
        GeoMethod::DeleteGeoLocation,
        GeoMethod::AddAddress,
        GeoMethod::UpdateAddress,
        GeoMethod::GetAddress,
        GeoMethod::GetAddresses,
        GeoMethod::GetAddressesByIds,
        GeoMethod::DeleteAddress,
        GeoMethod::GetServers,
    ];

    /// Bare method identifier, e.g. `AddAddress`.
    pub fn name(self) -> &'static str {
        match self {
            GeoMethod::GeoLocate => "GeoLocate",
            GeoMethod::GetGeoRoute => "GetGeoRoute",
            GeoMethod::GetAddressRoute => "GetAddressRoute",
            GeoMethod::AddGeoLocation => "AddGeoLocation",
            GeoMethod::AddGeoLocationLatLong => "AddGeoLocationLatLong",
            GeoMethod::GetGeoLocation => "GetGeoLocation",
            GeoMethod::GetGeoLocations => "GetGeoLocations",
            GeoMethod::DeleteGeoLocation => "DeleteGeoLocation",
            GeoMethod::AddAddress => "AddAddress",
            GeoMethod::UpdateAddress => "UpdateAddress",
            GeoMethod::GetAddress => "GetAddress",
            GeoMethod::GetAddresses => "GetAddresses",
            GeoMethod::GetAddressesByIds => "GetAddressesByIds",
            GeoMethod::DeleteAddress => "DeleteAddress",
            GeoMethod::GetServers => "GetServers",
        }
    }

    /// Fully-qualified name as sent on the wire, e.g. `/geo.v1.Geo/AddAddress`.
    pub fn full_name(self) -> String {
        format!("/{}/{}", GEO_SERVICE, self.name())
    }

    /// Looks up a method by its bare identifier or by a fully-qualified name.
    ///
    /// Only the last path segment is compared, so `/geo.v2.Geo/GetAddress`
    /// and `GetAddress` both resolve to [`GeoMethod::GetAddress`].
    pub fn from_name(name: &str) -> Option<GeoMethod> {
        let ident = name.rsplit('/').next().unwrap_or(name);
        let method = match ident {
            "GeoLocate" => GeoMethod::GeoLocate,
            "GetGeoRoute" => GeoMethod::GetGeoRoute,
            "GetAddressRoute" => GeoMethod::GetAddressRoute,
            "AddGeoLocation" => GeoMethod::AddGeoLocation,
            "AddGeoLocationLatLong" => GeoMethod::AddGeoLocationLatLong,
            "GetGeoLocation" => GeoMethod::GetGeoLocation,
            "GetGeoLocations" => GeoMethod::GetGeoLocations,
            "DeleteGeoLocation" => GeoMethod::DeleteGeoLocation,
            "AddAddress" => GeoMethod::AddAddress,
            "UpdateAddress" => GeoMethod::UpdateAddress,
            "GetAddress" => GeoMethod::GetAddress,
            "GetAddresses" => GeoMethod::GetAddresses,
            "GetAddressesByIds" => GeoMethod::GetAddressesByIds,
            "DeleteAddress" => GeoMethod::DeleteAddress,
            "GetServers" => GeoMethod::GetServers,
            _ => return None,
        };
        Some(method)
    }
}

impl fmt::Display for GeoMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
