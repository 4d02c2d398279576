//! Two-tier classification of an inbound wire envelope into
//! `(BusinessProcess, DocumentType)`.

use settlement_domain_models::{BusinessProcess, DocumentType};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("document name '{0}' carries no recognized Confirm/Reject/Notify prefix")]
    UnrecognizedDocumentType(String),
    #[error("document name '{0}' matches no known root anchor and no process type code was supplied")]
    UnrecognizedProcess(String),
    #[error("process type code '{0}' is not in the supported closed set")]
    UnrecognizedProcessCode(String),
}

/// Root document-name anchors, in the fixed order they're probed — longer,
/// more specific anchors first so `WholesaleSettlement` doesn't shadow
/// `WholesaleServices` or vice versa.
const ROOT_ANCHORS: &[(&str, BusinessProcess)] = &[
    ("ChangeOfSupplier", BusinessProcess::SupplyChange),
    ("EndOfSupply", BusinessProcess::EndOfSupply),
    ("AggregatedMeasureData", BusinessProcess::AggregatedData),
    ("MeasureData", BusinessProcess::MeteredData),
    ("MeteringPoint", BusinessProcess::MasterData),
    ("WholesaleSettlement", BusinessProcess::Wholesale),
    ("WholesaleServices", BusinessProcess::Wholesale),
    ("ChargeInformation", BusinessProcess::PriceList),
    ("PriceList", BusinessProcess::PriceList),
    ("ChargeLinks", BusinessProcess::PriceLink),
];

/// Extracts the `Confirm`/`Reject`/`Notify` prefix from a document name.
pub fn document_type_from_name(document_name: &str) -> Result<DocumentType, ClassificationError> {
    if document_name.starts_with("Confirm") {
        Ok(DocumentType::Confirm)
    } else if document_name.starts_with("Reject") {
        Ok(DocumentType::Reject)
    } else if document_name.starts_with("Notify") {
        Ok(DocumentType::Notify)
    } else {
        Err(ClassificationError::UnrecognizedDocumentType(document_name.to_string()))
    }
}

fn business_process_from_name(document_name: &str) -> Option<BusinessProcess> {
    ROOT_ANCHORS
        .iter()
        .find(|(anchor, _)| document_name.contains(anchor))
        .map(|(_, process)| *process)
}

/// Classifies an envelope. Tier 1 matches the document name against the
/// root-anchor table; tier 2 falls back to the `process.processType` code
/// when no anchor matched (e.g. BRS-003/004/009, which carry no anchor of
/// their own in §6's fixed list).
pub fn classify(
    document_name: Option<&str>,
    process_type_code: Option<&str>,
) -> Result<(BusinessProcess, DocumentType), ClassificationError> {
    let document_type = match document_name {
        Some(name) => document_type_from_name(name)?,
        None => DocumentType::Notify,
    };

    if let Some(name) = document_name {
        if let Some(process) = business_process_from_name(name) {
            return Ok((process, document_type));
        }
    }

    let code = process_type_code.ok_or_else(|| {
        ClassificationError::UnrecognizedProcess(document_name.unwrap_or_default().to_string())
    })?;
    let process = BusinessProcess::from_process_code(code)
        .ok_or_else(|| ClassificationError::UnrecognizedProcessCode(code.to_string()))?;
    Ok((process, document_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_change_of_supplier_classifies_via_document_name() {
        let (process, doc_type) = classify(
            Some("ConfirmRequestChangeOfSupplier_MarketDocument"),
            None,
        )
        .unwrap();
        assert_eq!(process, BusinessProcess::SupplyChange);
        assert_eq!(doc_type, DocumentType::Confirm);
    }

    #[test]
    fn notify_validated_measure_data_classifies() {
        let (process, doc_type) =
            classify(Some("NotifyValidatedMeasureData_MarketDocument"), None).unwrap();
        assert_eq!(process, BusinessProcess::MeteredData);
        assert_eq!(doc_type, DocumentType::Notify);
    }

    #[test]
    fn falls_back_to_process_type_code_for_move_in_move_out() {
        let (process, _) = classify(Some("NotifySomethingUnanchored_MarketDocument"), Some("E65")).unwrap();
        assert_eq!(process, BusinessProcess::MoveInMoveOut);
    }

    #[test]
    fn unrecognized_prefix_is_an_error() {
        assert!(classify(Some("WhoKnows_MarketDocument"), None).is_err());
    }

    #[test]
    fn unrecognized_process_code_is_an_error() {
        assert!(classify(None, Some("Z99")).is_err());
    }
}
