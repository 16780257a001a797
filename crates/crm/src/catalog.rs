//! The CRM lookup tools. The descriptors reach the router only after the
//! CRM has answered a discovery call at startup.

use askdb_core::routing::ToolDescriptor;

pub const GET_LEAD_INFO: &str = "get_lead_info";
pub const GET_SALES_LEAD_QUOTATIONS_WITH_ITEMS: &str = "get_sales_lead_quotations_with_items";
pub const GET_SALES_OPPORTUNITY_CARD_COUNTS: &str = "get_sales_opportunity_card_counts";
pub const GET_ACTIVE_OPPORTUNITIES_WITH_ITEMS: &str = "get_active_opportunities_with_items";
pub const GET_OPPORTUNITY_BY_ID_WITH_ITEMS: &str = "get_opportunity_by_id_with_items";
pub const GET_SALES_OPPORTUNITY_BY_ID: &str = "get_sales_opportunity_by_id";

/// Descriptors for every CRM tool, in the order they are presented to the
/// model. The descriptions double as routing hints, so they spell out the
/// expected argument.
pub fn catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            GET_LEAD_INFO,
            "Fetch a single sales lead by its numeric id. Argument: `id` (integer).",
        ),
        ToolDescriptor::new(
            GET_SALES_LEAD_QUOTATIONS_WITH_ITEMS,
            "Fetch all quotations, including their line items, for one sales lead. \
             Argument: `leadId` (string, e.g. LD001).",
        ),
        ToolDescriptor::new(
            GET_SALES_OPPORTUNITY_CARD_COUNTS,
            "Fetch the count of sales opportunities per pipeline card/status. No arguments.",
        ),
        ToolDescriptor::new(
            GET_ACTIVE_OPPORTUNITIES_WITH_ITEMS,
            "Fetch every active sales opportunity together with its line items. No arguments.",
        ),
        ToolDescriptor::new(
            GET_OPPORTUNITY_BY_ID_WITH_ITEMS,
            "Fetch one sales opportunity with its line items, looked up by either the \
             numeric id or the business opportunity id. Argument: `id_or_opportunity_id` \
             (string, e.g. 42 or OPP001).",
        ),
        ToolDescriptor::new(
            GET_SALES_OPPORTUNITY_BY_ID,
            "Fetch one sales opportunity record without items. Argument: `opportunityId` \
             (string).",
        ),
    ]
}
