//! Built-in checks for the cryptocurrency dashboard.
//!
//! The dashboard shows "Loading cryptocurrencies..." while it fetches the
//! coin list, then renders one `.card` per coin. [`scenarios`] validates
//! that structure; [`fixture`] scripts the same page for offline runs.

use crate::assertion::Check;
use crate::locator::Selector;
use crate::scenario::{FieldSpec, Scenario, WaitFor};

/// Cards the multiple-cryptocurrencies check expects at least
pub const MIN_LISTED_COINS: usize = 5;

pub fn card() -> Selector {
    Selector::class("card")
}

pub fn name() -> Selector {
    Selector::tag_with_class("h3", "font-semibold")
}

pub fn symbol() -> Selector {
    Selector::tag_with_class("p", "uppercase")
}

pub fn price() -> Selector {
    Selector::tag_with_class("p", "text-2xl")
}

pub fn change() -> Selector {
    Selector::tag_with_class("span", "font-medium")
}

pub fn market_cap() -> Selector {
    Selector::tag_with_class("p", "text-sm")
}

pub fn icon() -> Selector {
    Selector::tag("img")
}

pub fn favorite_button() -> Selector {
    Selector::tag("button")
}

/// The four dashboard scenarios, each starting from `url`
pub fn scenarios(url: &str) -> Vec<Scenario> {
    vec![
        list_loads(url),
        card_content(url),
        multiple_cryptos(url),
        favorite_button_present(url),
    ]
}

pub fn list_loads(url: &str) -> Scenario {
    Scenario::new("crypto list loads")
        .navigate(url)
        .wait_for(WaitFor::new(card()))
        .extract(vec![FieldSpec::count("cards", card())])
        .assert("cards", Check::CountAtLeast { min: 1 })
}

pub fn card_content(url: &str) -> Scenario {
    Scenario::new("crypto card content")
        .navigate(url)
        .wait_for(WaitFor::new(card()))
        .extract_within(
            card(),
            vec![
                FieldSpec::text("name", name()),
                FieldSpec::text("symbol", symbol()),
                FieldSpec::text("price", price()),
                FieldSpec::text("change", change()),
                FieldSpec::count("market cap", market_cap()),
                FieldSpec::attribute("icon", icon(), "src"),
            ],
        )
        .assert("name", Check::NonEmpty)
        .assert("symbol", Check::NonEmpty)
        .assert(
            "price",
            Check::Contains {
                token: "$".to_string(),
            },
        )
        .assert(
            "change",
            Check::Contains {
                token: "%".to_string(),
            },
        )
        .assert("market cap", Check::CountAtLeast { min: 1 })
        .assert(
            "icon",
            Check::UrlScheme {
                schemes: vec!["http".to_string(), "https".to_string()],
            },
        )
}

pub fn multiple_cryptos(url: &str) -> Scenario {
    Scenario::new("multiple cryptocurrencies")
        .navigate(url)
        .wait_for(WaitFor::new(card()).min_count(MIN_LISTED_COINS))
        .extract(vec![
            FieldSpec::count("cards", card()),
            FieldSpec::count("names", card().descendant(name())),
        ])
        .assert(
            "cards",
            Check::CountAtLeast {
                min: MIN_LISTED_COINS,
            },
        )
        .assert(
            "names",
            Check::CountAtLeast {
                min: MIN_LISTED_COINS,
            },
        )
}

pub fn favorite_button_present(url: &str) -> Scenario {
    Scenario::new("favorite button")
        .navigate(url)
        .wait_for(WaitFor::new(card()))
        .extract_within(
            card(),
            vec![
                FieldSpec::displayed("favorite button", favorite_button()),
                FieldSpec::count("favorite icon", favorite_button().descendant(Selector::tag("svg"))),
            ],
        )
        .assert("favorite button", Check::Displayed)
        .assert("favorite icon", Check::CountAtLeast { min: 1 })
}

/// Scripted rendition of the dashboard for [`crate::driver::MemoryDriver`]
pub mod fixture {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    use crate::driver::{Node, Page};

    /// How long the real dashboard takes to fetch its coin list
    pub const RENDER_DELAY: Duration = Duration::from_millis(1500);

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Coin {
        pub name: String,
        pub symbol: String,
        pub price: String,
        pub change: String,
        pub market_cap: String,
        pub icon: String,
    }

    const COINS: &[(&str, &str, &str, &str, &str)] = &[
        ("Bitcoin", "btc", "$67,245.18", "+2.31%", "$1.32T"),
        ("Ethereum", "eth", "$3,512.07", "-0.84%", "$421.9B"),
        ("Tether", "usdt", "$1.00", "+0.01%", "$110.4B"),
        ("BNB", "bnb", "$584.22", "+1.12%", "$86.2B"),
        ("Solana", "sol", "$148.93", "+4.57%", "$68.7B"),
        ("XRP", "xrp", "$0.52", "-1.36%", "$28.9B"),
        ("Cardano", "ada", "$0.45", "-2.05%", "$16.1B"),
        ("Dogecoin", "doge", "$0.16", "+6.40%", "$23.4B"),
        ("Polkadot", "dot", "$7.12", "+0.92%", "$10.2B"),
        ("Chainlink", "link", "$14.87", "-0.33%", "$8.7B"),
    ];

    /// The first `count` coins of the listing (at most ten)
    pub fn coins(count: usize) -> Vec<Coin> {
        COINS
            .iter()
            .take(count)
            .map(|(name, symbol, price, change, market_cap)| Coin {
                name: name.to_string(),
                symbol: symbol.to_string(),
                price: price.to_string(),
                change: change.to_string(),
                market_cap: market_cap.to_string(),
                icon: format!("https://assets.coincap.io/assets/icons/{}@2x.png", symbol),
            })
            .collect()
    }

    pub fn card(coin: &Coin) -> Node {
        let direction = if coin.change.starts_with('-') {
            "text-red-500"
        } else {
            "text-green-500"
        };
        Node::new("div")
            .class("card cursor-pointer")
            .child(
                Node::new("div")
                    .class("flex items-center")
                    .child(Node::new("img").attr("src", &coin.icon).attr("alt", &coin.name))
                    .child(Node::new("h3").class("font-semibold").text(&coin.name))
                    .child(Node::new("p").class("uppercase").text(&coin.symbol))
                    .child(
                        Node::new("button")
                            .attr("aria-label", "Add to favorites")
                            .child(Node::new("svg")),
                    ),
            )
            .child(Node::new("p").class("text-2xl font-bold").text(&coin.price))
            .child(Node::new("span").class(&format!("font-medium {}", direction)).text(&coin.change))
            .child(
                Node::new("p")
                    .class("text-sm text-gray-500")
                    .text(&format!("Market Cap: {}", coin.market_cap)),
            )
    }

    pub fn loading() -> Node {
        Node::new("div")
            .class("flex justify-center")
            .child(Node::new("p").text("Loading cryptocurrencies..."))
    }

    /// Loading screen, replaced by `count` cards after `delay`
    pub fn dashboard_page(count: usize, delay: Duration) -> Page {
        let grid = Node::new("div")
            .class("grid")
            .children(coins(count).iter().map(card));
        Page::new(loading()).then_after(delay, grid)
    }

    /// Loading screen that is never replaced
    pub fn stuck_page() -> Page {
        Page::new(loading())
    }

    /// Loading screen, replaced by the API error banner after `delay`
    pub fn failing_page(delay: Duration) -> Page {
        let banner = Node::new("div")
            .class("bg-red-100")
            .child(Node::new("p").class("font-medium").text("Error loading data"))
            .child(
                Node::new("p")
                    .class("text-sm")
                    .text("Request failed with status code 500"),
            );
        Page::new(loading()).then_after(delay, banner)
    }
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod dashboard_test;
