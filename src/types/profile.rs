//! Client profile data structures

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Valid age range in years
pub const AGE_RANGE: RangeInclusive<i32> = 18..=100;
/// Valid number of dependents
pub const DEPENDENTS_RANGE: RangeInclusive<i32> = 0..=10;
/// Valid distance to the service location in kilometres
pub const DISTANCE_KM_RANGE: RangeInclusive<f64> = 0.0..=50.0;
/// Valid number of contact methods on file
pub const CONTACT_METHODS_RANGE: RangeInclusive<i32> = 1..=5;

/// Declares a closed categorical domain with its wire labels.
macro_rules! categorical {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Every value of the domain, in form order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire labels of the domain, in form order
            pub const LABELS: &'static [&'static str] = &[$($label),+];

            /// Wire label of this value
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

categorical!(
    /// How the client is usually contacted
    ContactMethod {
        Phone => "phone",
        Email => "email",
        InPerson => "in-person",
    }
);

categorical!(
    /// Household type
    Household {
        Single => "single",
        Family => "family",
    }
);

categorical!(
    /// Preferred language of service
    PreferredLanguage {
        English => "english",
        Other => "other",
    }
);

categorical!(
    Sex {
        Male => "male",
        Female => "female",
    }
);

categorical!(
    /// Client status at the time of the visit
    ClientStatus {
        New => "new",
        Returning => "returning",
        Inactive => "inactive",
    }
);

categorical!(
    Season {
        Spring => "Spring",
        Summer => "Summer",
        Fall => "Fall",
        Winter => "Winter",
    }
);

categorical!(
    Month {
        January => "January",
        February => "February",
        March => "March",
        April => "April",
        May => "May",
        June => "June",
        July => "July",
        August => "August",
        September => "September",
        October => "October",
        November => "November",
        December => "December",
    }
);

categorical!(
    YesNo {
        Yes => "yes",
        No => "no",
    }
);

/// Column of a client profile, named as in the training data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileField {
    #[serde(rename = "contact_method")]
    ContactMethod,
    #[serde(rename = "household")]
    Household,
    #[serde(rename = "preferred_languages")]
    PreferredLanguages,
    #[serde(rename = "sex_new")]
    SexNew,
    #[serde(rename = "status")]
    Status,
    #[serde(rename = "Season")]
    Season,
    #[serde(rename = "Month")]
    Month,
    #[serde(rename = "latest_language_is_english")]
    LatestLanguageIsEnglish,
    #[serde(rename = "age")]
    Age,
    #[serde(rename = "dependents_qty")]
    DependentsQty,
    #[serde(rename = "distance_km")]
    DistanceKm,
    #[serde(rename = "num_of_contact_methods")]
    NumOfContactMethods,
}

impl ProfileField {
    /// All profile columns in training-data order
    pub const ALL: [ProfileField; 12] = [
        ProfileField::ContactMethod,
        ProfileField::Household,
        ProfileField::PreferredLanguages,
        ProfileField::SexNew,
        ProfileField::Status,
        ProfileField::Season,
        ProfileField::Month,
        ProfileField::LatestLanguageIsEnglish,
        ProfileField::Age,
        ProfileField::DependentsQty,
        ProfileField::DistanceKm,
        ProfileField::NumOfContactMethods,
    ];

    /// Column name
    pub fn name(&self) -> &'static str {
        match self {
            ProfileField::ContactMethod => "contact_method",
            ProfileField::Household => "household",
            ProfileField::PreferredLanguages => "preferred_languages",
            ProfileField::SexNew => "sex_new",
            ProfileField::Status => "status",
            ProfileField::Season => "Season",
            ProfileField::Month => "Month",
            ProfileField::LatestLanguageIsEnglish => "latest_language_is_english",
            ProfileField::Age => "age",
            ProfileField::DependentsQty => "dependents_qty",
            ProfileField::DistanceKm => "distance_km",
            ProfileField::NumOfContactMethods => "num_of_contact_methods",
        }
    }

    /// Category labels for categorical columns, `None` for numeric ones
    pub fn categories(&self) -> Option<&'static [&'static str]> {
        match self {
            ProfileField::ContactMethod => Some(ContactMethod::LABELS),
            ProfileField::Household => Some(Household::LABELS),
            ProfileField::PreferredLanguages => Some(PreferredLanguage::LABELS),
            ProfileField::SexNew => Some(Sex::LABELS),
            ProfileField::Status => Some(ClientStatus::LABELS),
            ProfileField::Season => Some(Season::LABELS),
            ProfileField::Month => Some(Month::LABELS),
            ProfileField::LatestLanguageIsEnglish => Some(YesNo::LABELS),
            ProfileField::Age
            | ProfileField::DependentsQty
            | ProfileField::DistanceKm
            | ProfileField::NumOfContactMethods => None,
        }
    }

    pub fn is_categorical(&self) -> bool {
        self.categories().is_some()
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a single profile column
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Category(&'static str),
    Number(f64),
}

/// Attributes of a single client, as collected by the intake form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientProfile {
    pub contact_method: ContactMethod,
    pub household: Household,
    pub preferred_languages: PreferredLanguage,
    pub sex_new: Sex,
    pub status: ClientStatus,
    #[serde(rename = "Season")]
    pub season: Season,
    #[serde(rename = "Month")]
    pub month: Month,
    pub latest_language_is_english: YesNo,
    /// Age in years
    pub age: i32,
    /// Number of dependents in the household
    pub dependents_qty: i32,
    /// Distance to the service location in kilometres
    pub distance_km: f64,
    /// Number of contact methods on file
    pub num_of_contact_methods: i32,
}

impl ClientProfile {
    /// Check every numeric column against its domain.
    ///
    /// Categorical columns are closed enums and cannot be out of domain once
    /// deserialized.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_int("age", self.age, &AGE_RANGE)?;
        check_int("dependents_qty", self.dependents_qty, &DEPENDENTS_RANGE)?;
        check_int(
            "num_of_contact_methods",
            self.num_of_contact_methods,
            &CONTACT_METHODS_RANGE,
        )?;

        if !self.distance_km.is_finite() {
            return Err(ValidationError::NotFinite {
                field: "distance_km",
            });
        }
        if !DISTANCE_KM_RANGE.contains(&self.distance_km) {
            return Err(ValidationError::OutOfRange {
                field: "distance_km",
                min: *DISTANCE_KM_RANGE.start(),
                max: *DISTANCE_KM_RANGE.end(),
                value: self.distance_km,
            });
        }

        Ok(())
    }

    /// Value of a column
    pub fn value(&self, field: ProfileField) -> FieldValue {
        match field {
            ProfileField::ContactMethod => FieldValue::Category(self.contact_method.as_str()),
            ProfileField::Household => FieldValue::Category(self.household.as_str()),
            ProfileField::PreferredLanguages => {
                FieldValue::Category(self.preferred_languages.as_str())
            }
            ProfileField::SexNew => FieldValue::Category(self.sex_new.as_str()),
            ProfileField::Status => FieldValue::Category(self.status.as_str()),
            ProfileField::Season => FieldValue::Category(self.season.as_str()),
            ProfileField::Month => FieldValue::Category(self.month.as_str()),
            ProfileField::LatestLanguageIsEnglish => {
                FieldValue::Category(self.latest_language_is_english.as_str())
            }
            ProfileField::Age => FieldValue::Number(self.age as f64),
            ProfileField::DependentsQty => FieldValue::Number(self.dependents_qty as f64),
            ProfileField::DistanceKm => FieldValue::Number(self.distance_km),
            ProfileField::NumOfContactMethods => {
                FieldValue::Number(self.num_of_contact_methods as f64)
            }
        }
    }
}

impl Default for ClientProfile {
    /// The intake form's initial state
    fn default() -> Self {
        Self {
            contact_method: ContactMethod::Phone,
            household: Household::Single,
            preferred_languages: PreferredLanguage::English,
            sex_new: Sex::Male,
            status: ClientStatus::New,
            season: Season::Spring,
            month: Month::January,
            latest_language_is_english: YesNo::Yes,
            age: 35,
            dependents_qty: 1,
            distance_km: 5.0,
            num_of_contact_methods: 2,
        }
    }
}

fn check_int(
    field: &'static str,
    value: i32,
    range: &RangeInclusive<i32>,
) -> Result<(), ValidationError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min: *range.start() as f64,
            max: *range.end() as f64,
            value: value as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_valid() {
        assert!(ClientProfile::default().validate().is_ok());
    }

    #[test]
    fn test_age_boundaries() {
        for age in [18, 100] {
            let profile = ClientProfile {
                age,
                ..Default::default()
            };
            assert!(profile.validate().is_ok(), "age {} should be accepted", age);
        }

        for age in [17, 101] {
            let profile = ClientProfile {
                age,
                ..Default::default()
            };
            assert!(
                matches!(
                    profile.validate(),
                    Err(ValidationError::OutOfRange { field: "age", .. })
                ),
                "age {} should be rejected",
                age
            );
        }
    }

    #[test]
    fn test_numeric_domains() {
        let profile = ClientProfile {
            dependents_qty: 11,
            ..Default::default()
        };
        assert!(profile.validate().is_err());

        let profile = ClientProfile {
            num_of_contact_methods: 0,
            ..Default::default()
        };
        assert!(profile.validate().is_err());

        let profile = ClientProfile {
            distance_km: 50.0,
            ..Default::default()
        };
        assert!(profile.validate().is_ok());

        let profile = ClientProfile {
            distance_km: 50.5,
            ..Default::default()
        };
        assert!(profile.validate().is_err());

        let profile = ClientProfile {
            distance_km: f64::NAN,
            ..Default::default()
        };
        assert_eq!(
            profile.validate(),
            Err(ValidationError::NotFinite {
                field: "distance_km"
            })
        );
    }

    #[test]
    fn test_profile_wire_names() {
        let json = serde_json::to_value(ClientProfile::default()).unwrap();
        assert_eq!(json["contact_method"], "phone");
        assert_eq!(json["Season"], "Spring");
        assert_eq!(json["Month"], "January");
        assert_eq!(json["latest_language_is_english"], "yes");
        assert_eq!(json["age"], 35);
    }

    #[test]
    fn test_profile_rejects_unknown_category() {
        let mut json = serde_json::to_value(ClientProfile::default()).unwrap();
        json["contact_method"] = "fax".into();
        assert!(serde_json::from_value::<ClientProfile>(json).is_err());
    }

    #[test]
    fn test_profile_deserialization() {
        let json = r#"{
            "contact_method": "in-person",
            "household": "family",
            "preferred_languages": "other",
            "sex_new": "female",
            "status": "returning",
            "Season": "Fall",
            "Month": "October",
            "latest_language_is_english": "no",
            "age": 62,
            "dependents_qty": 3,
            "distance_km": 12.5,
            "num_of_contact_methods": 4
        }"#;

        let profile: ClientProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.contact_method, ContactMethod::InPerson);
        assert_eq!(profile.month, Month::October);
        assert_eq!(
            profile.value(ProfileField::DistanceKm),
            FieldValue::Number(12.5)
        );
        assert_eq!(
            profile.value(ProfileField::Household),
            FieldValue::Category("family")
        );
    }

    #[test]
    fn test_field_categories() {
        assert_eq!(
            ProfileField::ContactMethod.categories(),
            Some(&["phone", "email", "in-person"][..])
        );
        assert_eq!(Month::ALL.len(), 12);
        assert!(!ProfileField::Age.is_categorical());
        assert!(ProfileField::Season.is_categorical());
    }
}
