//! Entry decoding driven by a single column table.
//!
//! Each row of [`FIELDS`] names an output column, the [`FieldPath`] that
//! reaches it inside an entry, and its [`FieldKind`]. Decoding is one pass
//! over the table, so adding a column is a one-line change here.

use super::document::Element;
use super::extract::FieldPath;
use super::extract::FieldPath::{Attribute, Entry, FirstOf, Nested, Text};
use crate::models::{ContractRecord, FieldKind};

/// Value used for any field the entry does not carry.
pub const ABSENT: &str = "";

/// One output column and where to find it.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub column: &'static str,
    pub path: FieldPath,
    pub kind: FieldKind,
}

const fn text(column: &'static str, path: FieldPath) -> FieldSpec {
    FieldSpec {
        column,
        path,
        kind: FieldKind::Text,
    }
}

const fn money(column: &'static str) -> FieldSpec {
    FieldSpec {
        column,
        path: Text(column),
        kind: FieldKind::Money,
    }
}

/// Same-named element anywhere in the entry.
const fn plain(column: &'static str) -> FieldSpec {
    text(column, Text(column))
}

// Awards carry their identifiers under awardContractID, IDVs under IDVID.
const PIID: FieldPath = FirstOf(&[
    Nested("awardContractID", "PIID"),
    Nested("IDVID", "PIID"),
]);
const MOD_NUMBER: FieldPath = FirstOf(&[
    Nested("awardContractID", "modNumber"),
    Nested("IDVID", "modNumber"),
]);

/// Output columns in order. This order is the CSV header and the database
/// column list.
pub static FIELDS: [FieldSpec; 60] = [
    text("title", Entry("title")),
    text("modified", Entry("modified")),
    text("PIID", PIID),
    text("modNumber", MOD_NUMBER),
    text("referencedIDVPIID", Nested("referencedIDVID", "PIID")),
    text("IDVModNumber", Nested("referencedIDVID", "modNumber")),
    plain("UEI"),
    plain("UEILegalBusinessName"),
    plain("immediateParentUEI"),
    plain("immediateParentUEIName"),
    plain("domesticParentUEI"),
    plain("domesticParentUEIName"),
    plain("ultimateParentUEI"),
    plain("ultimateParentUEIName"),
    plain("vendorName"),
    plain("vendorAlternateName"),
    plain("vendorLegalOrganizationName"),
    text("vendorStreetAddress", Nested("vendorLocation", "streetAddress")),
    text("vendorCity", Nested("vendorLocation", "city")),
    text("vendorState", Nested("vendorLocation", "state")),
    text("vendorZIPCode", Nested("vendorLocation", "ZIPCode")),
    text("vendorCountryCode", Nested("vendorLocation", "countryCode")),
    text("vendorPhoneNo", Nested("vendorLocation", "phoneNo")),
    text("vendorFaxNo", Nested("vendorLocation", "faxNo")),
    text(
        "vendorCongressionalDistrictCode",
        Nested("vendorLocation", "congressionalDistrictCode"),
    ),
    text(
        "vendorEntityDataSource",
        Nested("vendorLocation", "entityDataSource"),
    ),
    money("obligatedAmount"),
    money("baseAndExercisedOptionsValue"),
    money("baseAndAllOptionsValue"),
    money("totalObligatedAmount"),
    money("totalBaseAndExercisedOptionsValue"),
    money("totalBaseAndAllOptionsValue"),
    plain("signedDate"),
    plain("effectiveDate"),
    plain("currentCompletionDate"),
    plain("ultimateCompletionDate"),
    text(
        "fundingRequestingDepartmentID",
        Attribute("fundingRequestingAgencyID", "departmentID"),
    ),
    text(
        "fundingRequestingDepartmentName",
        Attribute("fundingRequestingAgencyID", "departmentName"),
    ),
    plain("fundingRequestingAgencyID"),
    text(
        "fundingRequestingAgencyName",
        Attribute("fundingRequestingAgencyID", "name"),
    ),
    plain("fundingRequestingOfficeID"),
    text(
        "fundingRequestingOfficeName",
        Attribute("fundingRequestingOfficeID", "name"),
    ),
    plain("contractingOfficeAgencyID"),
    plain("contractingOfficeID"),
    plain("principalNAICSCode"),
    text(
        "principalNAICSCodeDescription",
        Attribute("principalNAICSCode", "description"),
    ),
    plain("productOrServiceCode"),
    text(
        "productOrServiceCodeDescription",
        Attribute("productOrServiceCode", "description"),
    ),
    text(
        "productOrServiceCodeType",
        Attribute("productOrServiceCode", "productOrServiceType"),
    ),
    plain("descriptionOfContractRequirement"),
    plain("reasonForModification"),
    text(
        "reasonForModificationDescription",
        Attribute("reasonForModification", "description"),
    ),
    plain("createdBy"),
    plain("createdDate"),
    plain("lastModifiedBy"),
    plain("lastModifiedDate"),
    plain("approvedBy"),
    plain("approvedDate"),
    plain("closedBy"),
    plain("closedDate"),
];

/// Decode one Atom `entry` element.
///
/// Works the same for award and IDV entries. `PIID` and `modNumber` come
/// from `awardContractID` when present and from `IDVID` otherwise.
///
/// # Arguments
///
/// * `entry` - An Atom `entry` element from a parsed feed page
///
/// # Returns
///
/// A record with one value per column of [`FIELDS`]. This never fails:
/// missing fields are [`ABSENT`].
pub fn decode(entry: &Element) -> ContractRecord {
    let values = FIELDS
        .iter()
        .map(|spec| spec.path.resolve(entry, ABSENT).to_string())
        .collect();
    ContractRecord::from_values(values)
}
