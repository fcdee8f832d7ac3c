use georpc_common::GeoMethod;

/// Whether a call must reach the leader or may be served by any replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationIntent {
    /// Mutates backend state; leader only.
    Write,
    /// Retrieval; any follower may serve it.
    Read,
}

/// Maps method names to an [`OperationIntent`].
///
/// Known names resolve through [`GeoMethod::from_name`], which matches on the
/// last `/` segment, so the package version in a fully-qualified name
/// (`/geo.v1.Geo/...`, `/geo.vX.Geo/...`) does not matter.
///
/// Unknown names get `default_intent`, which is [`OperationIntent::Write`]
/// unless configured otherwise: an unrecognised operation is sent to the
/// leader, where it is always correct.
#[derive(Debug, Clone, Copy)]
pub struct MethodClassifier {
    default_intent: OperationIntent,
}

impl MethodClassifier {
    pub fn new() -> Self {
        Self::with_default(OperationIntent::Write)
    }

    pub fn with_default(default_intent: OperationIntent) -> Self {
        Self { default_intent }
    }

    /// Intent for a known method.
    pub fn intent_of(method: GeoMethod) -> OperationIntent {
        match method {
            GeoMethod::AddGeoLocation
            | GeoMethod::AddGeoLocationLatLong
            | GeoMethod::DeleteGeoLocation
            | GeoMethod::AddAddress
            | GeoMethod::UpdateAddress
            | GeoMethod::DeleteAddress => OperationIntent::Write,

            GeoMethod::GeoLocate
            | GeoMethod::GetGeoRoute
            | GeoMethod::GetAddressRoute
            | GeoMethod::GetGeoLocation
            | GeoMethod::GetGeoLocations
            | GeoMethod::GetAddress
            | GeoMethod::GetAddresses
            | GeoMethod::GetAddressesByIds
            | GeoMethod::GetServers => OperationIntent::Read,
        }
    }

    pub fn classify(&self, method: &str) -> OperationIntent {
        GeoMethod::from_name(method)
            .map(Self::intent_of)
            .unwrap_or(self.default_intent)
    }
}

impl Default for MethodClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutations_are_writes() {
        let classifier = MethodClassifier::new();
        for method in [
            "/geo.v1.Geo/AddGeoLocation",
            "/geo.v1.Geo/AddGeoLocationLatLong",
            "/geo.v1.Geo/DeleteGeoLocation",
            "/geo.v1.Geo/AddAddress",
            "/geo.v1.Geo/UpdateAddress",
            "/geo.v1.Geo/DeleteAddress",
        ] {
            assert_eq!(classifier.classify(method), OperationIntent::Write, "{}", method);
        }
    }

    #[test]
    fn test_retrievals_are_reads() {
        let classifier = MethodClassifier::new();
        for method in [
            "/geo.v1.Geo/GeoLocate",
            "/geo.v1.Geo/GetGeoRoute",
            "/geo.v1.Geo/GetAddressRoute",
            "/geo.v1.Geo/GetGeoLocation",
            "/geo.v1.Geo/GetGeoLocations",
            "/geo.v1.Geo/GetAddress",
            "/geo.v1.Geo/GetAddresses",
            "/geo.v1.Geo/GetAddressesByIds",
            "/geo.v1.Geo/GetServers",
        ] {
            assert_eq!(classifier.classify(method), OperationIntent::Read, "{}", method);
        }
    }

    #[test]
    fn test_every_known_method_uses_its_fixed_intent() {
        let classifier = MethodClassifier::with_default(OperationIntent::Read);
        for method in GeoMethod::ALL {
            assert_eq!(
                classifier.classify(&method.full_name()),
                MethodClassifier::intent_of(method),
                "{}",
                method
            );
        }
    }

    #[test]
    fn test_package_version_is_ignored() {
        let classifier = MethodClassifier::new();
        assert_eq!(classifier.classify("/geo.vX.Geo/AddAddress"), OperationIntent::Write);
        assert_eq!(classifier.classify("/geo.vX.Geo/GetAddress"), OperationIntent::Read);
        assert_eq!(classifier.classify("GetAddress"), OperationIntent::Read);
    }

    #[test]
    fn test_unknown_defaults_to_write() {
        let classifier = MethodClassifier::new();
        assert_eq!(classifier.classify("/geo.v1.Geo/GetSomethingNew"), OperationIntent::Write);
        assert_eq!(classifier.classify(""), OperationIntent::Write);
    }

    #[test]
    fn test_unknown_default_is_configurable() {
        let classifier = MethodClassifier::with_default(OperationIntent::Read);
        assert_eq!(classifier.classify("/geo.v1.Geo/Mystery"), OperationIntent::Read);
        // Known names are unaffected
        assert_eq!(classifier.classify("/geo.v1.Geo/AddAddress"), OperationIntent::Write);
    }

    #[test]
    fn test_no_prefix_matching() {
        // "Add" prefix alone must not make an unknown method a write when
        // the default says otherwise
        let classifier = MethodClassifier::with_default(OperationIntent::Read);
        assert_eq!(classifier.classify("/geo.v1.Geo/AddressBook"), OperationIntent::Read);
    }
}
