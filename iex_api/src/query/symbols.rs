use url::Url;

use super::common::Query;

/// Query for `/ref-data/symbols`. The client only decodes CSV.
#[derive(Clone, Copy, Debug, Default)]
pub struct SymbolsQuery;

impl Query for SymbolsQuery {
    fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut().append_pair("format", "csv");
        url
    }
}
