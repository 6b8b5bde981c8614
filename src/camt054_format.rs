//! CAMT.054 (ISO 20022) debit/credit notification reader.
//!
//! Banks deliver camt.054 files next to, or instead of, the printed statement.
//! Each `Ntry` may batch several transactions in `NtryDtls/TxDtls`; every
//! detail becomes one [`NotificationEntry`]. An entry without details yields
//! a single row.

use crate::error::{Error, Result};
use crate::types::DebitCredit;
use chrono::NaiveDate;
use csv::Writer;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::{Read, Write};
use std::str::FromStr;

/// One booked movement from a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEntry {
    pub booking_date: Option<NaiveDate>,
    pub value_date: Option<NaiveDate>,
    pub amount: Decimal,
    pub currency: String,
    pub debit_credit: DebitCredit,
    /// Structured creditor reference, else end-to-end id, else entry reference.
    pub reference: Option<String>,
    pub counterparty: Option<String>,
    pub remittance: String,
}

/// A parsed camt.054 document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Camt054Notification {
    pub message_id: Option<String>,
    /// IBAN (or other id) of the notified account, from the first notification.
    pub account: Option<String>,
    pub entries: Vec<NotificationEntry>,
}

impl Camt054Notification {
    /// Parse a camt.054 notification from any source implementing `Read`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::fs::File;
    /// use abaconvert::camt054_format::Camt054Notification;
    ///
    /// let mut file = File::open("notification.xml")?;
    /// let notification = Camt054Notification::from_read(&mut file)?;
    /// println!("{} entries", notification.entries.len());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut xml_content = String::new();
        reader.read_to_string(&mut xml_content)?;

        let document: Document = serde_xml_rs::from_str(&xml_content)?;

        Self::from_document(document)
    }

    /// Export the entries as CSV.
    pub fn write_csv<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut csv_writer = Writer::from_writer(writer);

        csv_writer.write_record([
            "BookingDate",
            "ValueDate",
            "Amount",
            "Currency",
            "CreditDebit",
            "Reference",
            "Counterparty",
            "Remittance",
        ])?;

        for entry in &self.entries {
            csv_writer.write_record([
                format_date(entry.booking_date),
                format_date(entry.value_date),
                format!("{:.2}", entry.amount),
                entry.currency.clone(),
                entry.debit_credit.to_iso_format().to_string(),
                entry.reference.clone().unwrap_or_default(),
                entry.counterparty.clone().unwrap_or_default(),
                entry.remittance.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    fn from_document(document: Document) -> Result<Self> {
        let root = document.bk_to_cstmr_dbt_cdt_ntfctn;
        let mut notification = Camt054Notification {
            message_id: root.grp_hdr.and_then(|h| h.msg_id),
            ..Default::default()
        };

        for ntfctn in &root.ntfctn {
            if notification.account.is_none() {
                notification.account = ntfctn
                    .acct
                    .as_ref()
                    .and_then(|a| a.id.iban.clone().or_else(|| a.id.othr.as_ref().map(|o| o.id.clone())));
            }

            for entry in &ntfctn.ntry {
                notification.entries.extend(Self::parse_entry(entry)?);
            }
        }

        log::info!(
            "camt.054: {} entries from {} notifications",
            notification.entries.len(),
            root.ntfctn.len()
        );

        Ok(notification)
    }

    fn parse_entry(entry: &EntryXml) -> Result<Vec<NotificationEntry>> {
        let amount = parse_decimal(&entry.amt.value)?;
        let debit_credit = parse_indicator(&entry.cdt_dbt_ind)?;
        let currency = entry.amt.ccy().unwrap_or_default();
        let booking_date = entry.bookg_dt.as_ref().map(DateXml::parse).transpose()?.flatten();
        let value_date = entry.val_dt.as_ref().map(DateXml::parse).transpose()?.flatten();

        let base = NotificationEntry {
            booking_date,
            value_date,
            amount,
            currency,
            debit_credit,
            reference: entry.ntry_ref.clone(),
            counterparty: None,
            remittance: entry.addtl_ntry_inf.clone().unwrap_or_default(),
        };

        let details: Vec<&TransactionDetailsXml> = entry.ntry_dtls.iter().flat_map(|d| d.tx_dtls.iter()).collect();
        if details.is_empty() {
            return Ok(vec![base]);
        }

        details
            .into_iter()
            .map(|tx| Self::parse_details(tx, &base))
            .collect()
    }

    fn parse_details(tx: &TransactionDetailsXml, base: &NotificationEntry) -> Result<NotificationEntry> {
        let mut row = base.clone();

        let tx_amount = tx
            .amt
            .as_ref()
            .or_else(|| tx.amt_dtls.as_ref().and_then(|d| d.tx_amt.as_ref()).map(|t| &t.amt));
        if let Some(amt) = tx_amount {
            row.amount = parse_decimal(&amt.value)?;
            if let Some(ccy) = amt.ccy() {
                row.currency = ccy;
            }
        }
        if let Some(ref ind) = tx.cdt_dbt_ind {
            row.debit_credit = parse_indicator(ind)?;
        }

        let creditor_reference = tx
            .rmt_inf
            .as_ref()
            .and_then(|r| r.strd.iter().find_map(|s| s.cdtr_ref_inf.as_ref()?.ref_val.clone()));
        let end_to_end = tx
            .refs
            .as_ref()
            .and_then(|r| r.end_to_end_id.clone())
            .filter(|id| id != "NOTPROVIDED");
        row.reference = creditor_reference.or(end_to_end).or(row.reference);

        // The other party: who paid us on a credit, whom we paid on a debit.
        row.counterparty = tx.rltd_pties.as_ref().and_then(|p| match row.debit_credit {
            DebitCredit::Credit => p.dbtr.as_ref().and_then(PartyXml::name),
            DebitCredit::Debit => p.cdtr.as_ref().and_then(PartyXml::name),
        });

        if let Some(ref rmt_inf) = tx.rmt_inf {
            if !rmt_inf.ustrd.is_empty() {
                row.remittance = rmt_inf.ustrd.join(" ");
            }
        }
        if row.remittance.is_empty() {
            row.remittance = tx.addtl_tx_inf.clone().unwrap_or_default();
        }

        Ok(row)
    }
}

// XML structure definitions
#[derive(Debug, Deserialize)]
#[serde(rename = "Document")]
struct Document {
    #[serde(rename = "BkToCstmrDbtCdtNtfctn")]
    bk_to_cstmr_dbt_cdt_ntfctn: NotificationMessageXml,
}

#[derive(Debug, Deserialize)]
struct NotificationMessageXml {
    #[serde(rename = "GrpHdr")]
    grp_hdr: Option<GroupHeaderXml>,
    #[serde(rename = "Ntfctn", default)]
    ntfctn: Vec<NotificationXml>,
}

#[derive(Debug, Deserialize)]
struct GroupHeaderXml {
    #[serde(rename = "MsgId")]
    msg_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NotificationXml {
    #[serde(rename = "Acct")]
    acct: Option<AccountXml>,
    #[serde(rename = "Ntry", default)]
    ntry: Vec<EntryXml>,
}

#[derive(Debug, Deserialize)]
struct AccountXml {
    #[serde(rename = "Id")]
    id: AccountIdXml,
}

#[derive(Debug, Deserialize)]
struct AccountIdXml {
    #[serde(rename = "IBAN")]
    iban: Option<String>,
    #[serde(rename = "Othr")]
    othr: Option<OtherAccountIdXml>,
}

#[derive(Debug, Deserialize)]
struct OtherAccountIdXml {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct AmountXml {
    #[serde(rename = "$value")]
    value: String,
    #[serde(rename = "@Ccy")]
    ccy: Option<String>,
    #[serde(rename = "Ccy")]
    ccy_alt: Option<String>,
}

impl AmountXml {
    fn ccy(&self) -> Option<String> {
        self.ccy.clone().or_else(|| self.ccy_alt.clone())
    }
}

#[derive(Debug, Deserialize)]
struct DateXml {
    #[serde(rename = "Dt")]
    dt: Option<String>,
    #[serde(rename = "DtTm")]
    dt_tm: Option<String>,
}

impl DateXml {
    fn parse(&self) -> Result<Option<NaiveDate>> {
        match (&self.dt, &self.dt_tm) {
            (Some(dt), _) => parse_date_only(dt).map(Some),
            (None, Some(dt_tm)) => parse_camt_date(dt_tm).map(Some),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EntryXml {
    #[serde(rename = "NtryRef")]
    ntry_ref: Option<String>,
    #[serde(rename = "Amt")]
    amt: AmountXml,
    #[serde(rename = "CdtDbtInd")]
    cdt_dbt_ind: String,
    #[serde(rename = "BookgDt")]
    bookg_dt: Option<DateXml>,
    #[serde(rename = "ValDt")]
    val_dt: Option<DateXml>,
    #[serde(rename = "NtryDtls", default)]
    ntry_dtls: Vec<EntryDetailsXml>,
    #[serde(rename = "AddtlNtryInf")]
    addtl_ntry_inf: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EntryDetailsXml {
    #[serde(rename = "TxDtls", default)]
    tx_dtls: Vec<TransactionDetailsXml>,
}

#[derive(Debug, Deserialize)]
struct TransactionDetailsXml {
    #[serde(rename = "Refs")]
    refs: Option<ReferencesXml>,
    #[serde(rename = "Amt")]
    amt: Option<AmountXml>,
    #[serde(rename = "CdtDbtInd")]
    cdt_dbt_ind: Option<String>,
    #[serde(rename = "AmtDtls")]
    amt_dtls: Option<AmountDetailsXml>,
    #[serde(rename = "RltdPties")]
    rltd_pties: Option<RelatedPartiesXml>,
    #[serde(rename = "RmtInf")]
    rmt_inf: Option<RemittanceInformationXml>,
    #[serde(rename = "AddtlTxInf")]
    addtl_tx_inf: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReferencesXml {
    #[serde(rename = "EndToEndId")]
    end_to_end_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AmountDetailsXml {
    #[serde(rename = "TxAmt")]
    tx_amt: Option<TransactionAmountXml>,
}

#[derive(Debug, Deserialize)]
struct TransactionAmountXml {
    #[serde(rename = "Amt")]
    amt: AmountXml,
}

#[derive(Debug, Deserialize)]
struct RelatedPartiesXml {
    #[serde(rename = "Dbtr")]
    dbtr: Option<PartyXml>,
    #[serde(rename = "Cdtr")]
    cdtr: Option<PartyXml>,
}

/// `Nm` sits directly under the party in older versions and under `Pty`
/// from camt.054.001.08 on.
#[derive(Debug, Deserialize)]
struct PartyXml {
    #[serde(rename = "Nm")]
    nm: Option<String>,
    #[serde(rename = "Pty")]
    pty: Option<PartyNameXml>,
}

impl PartyXml {
    fn name(&self) -> Option<String> {
        self.nm.clone().or_else(|| self.pty.as_ref().and_then(|p| p.nm.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct PartyNameXml {
    #[serde(rename = "Nm")]
    nm: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemittanceInformationXml {
    #[serde(rename = "Ustrd", default)]
    ustrd: Vec<String>,
    #[serde(rename = "Strd", default)]
    strd: Vec<StructuredRemittanceXml>,
}

#[derive(Debug, Deserialize)]
struct StructuredRemittanceXml {
    #[serde(rename = "CdtrRefInf")]
    cdtr_ref_inf: Option<CreditorReferenceXml>,
}

#[derive(Debug, Deserialize)]
struct CreditorReferenceXml {
    #[serde(rename = "Ref")]
    ref_val: Option<String>,
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|_| Error::InvalidAmount(raw.to_string()))
}

fn parse_indicator(raw: &str) -> Result<DebitCredit> {
    raw.parse::<DebitCredit>().map_err(Error::ParseError)
}

fn parse_camt_date(date_str: &str) -> Result<NaiveDate> {
    let date_str = date_str.trim();
    // 2024-03-05T10:15:00+01:00
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date_str) {
        return Ok(dt.date_naive());
    }
    // 2024-03-05T10:15:00
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.date());
    }
    parse_date_only(date_str)
}

fn parse_date_only(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|_| Error::InvalidDate(date_str.to_string()))
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d.%m.%Y").to_string()).unwrap_or_default()
}
