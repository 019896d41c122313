//! Order pricing.
//!
//! The price of an order is computed once, when it is published, from the
//! service payload plus an optional boost (加价) the publisher adds to attract
//! riders. The platform takes a service-specific commission on the base and
//! add-on amounts; the boost always goes to the rider in full.

use errand_types::{AddOns, ParcelSize, ServiceDetails, ServiceType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while pricing an order.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
	#[error("{0} cannot be negative")]
	Negative(&'static str),
	#[error("Service '{0}' requires an explicit base price")]
	MissingBasePrice(ServiceType),
	#[error("Supermarket order has no goods")]
	EmptyGoodsList,
	#[error("Price is too large")]
	Overflow,
}

/// Inputs to pricing that are not part of the service payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceExtras {
	/// Extra amount offered to riders, exempt from commission.
	pub boost: Decimal,
	/// Base price for services without a fixed tariff. Required for
	/// `other`; for oversized express parcels it replaces the zero
	/// placeholder once customer service has agreed a price.
	pub base_price: Option<Decimal>,
}

/// Breakdown of an order's price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
	pub base: Decimal,
	pub additional: Decimal,
	pub boost: Decimal,
	pub total: Decimal,
	pub commission_rate: Decimal,
	pub platform_commission: Decimal,
	pub rider_earnings: Decimal,
}

/// Commission rate taken by the platform for a service type.
pub fn commission_rate(service_type: ServiceType) -> Decimal {
	match service_type {
		ServiceType::Express | ServiceType::Supermarket => Decimal::new(4, 1),
		ServiceType::Takeout | ServiceType::Substitute | ServiceType::CourseBrush => {
			Decimal::new(1, 1)
		},
		ServiceType::Other => Decimal::new(2, 1),
	}
}

fn parcel_fee(size: ParcelSize) -> Decimal {
	match size {
		ParcelSize::Small => Decimal::new(250, 2),
		ParcelSize::Medium => Decimal::new(350, 2),
		ParcelSize::Large => Decimal::new(500, 2),
		ParcelSize::Heavy => Decimal::ZERO,
	}
}

fn add_on_total(add_ons: &AddOns) -> Decimal {
	let mut total = Decimal::ZERO;
	if add_ons.exam {
		total += Decimal::from(10);
	}
	if add_ons.homework {
		total += Decimal::from(8);
	}
	if add_ons.discussion {
		total += Decimal::from(5);
	}
	total
}

/// Prices an order from its payload and extras.
pub fn quote(details: &ServiceDetails, extras: &PriceExtras) -> Result<PriceQuote, PricingError> {
	if extras.boost < Decimal::ZERO {
		return Err(PricingError::Negative("boost"));
	}
	if extras.base_price.is_some_and(|p| p < Decimal::ZERO) {
		return Err(PricingError::Negative("base price"));
	}

	let service_type = details.service_type();
	let (base, additional) = match details {
		ServiceDetails::Express(express) => match (express.weight, extras.base_price) {
			(ParcelSize::Heavy, Some(agreed)) => (agreed, Decimal::ZERO),
			(size, _) => (parcel_fee(size), Decimal::ZERO),
		},
		ServiceDetails::Takeout(_) => (Decimal::new(250, 2), Decimal::ZERO),
		ServiceDetails::Supermarket(supermarket) => {
			if supermarket.goods_list.is_empty() {
				return Err(PricingError::EmptyGoodsList);
			}
			let mut sum = Decimal::ZERO;
			for item in &supermarket.goods_list {
				if item.price < Decimal::ZERO {
					return Err(PricingError::Negative("goods price"));
				}
				let line = item
					.price
					.checked_mul(Decimal::from(item.count))
					.ok_or(PricingError::Overflow)?;
				sum = sum.checked_add(line).ok_or(PricingError::Overflow)?;
			}
			(sum, Decimal::ZERO)
		},
		ServiceDetails::Substitute(substitute) => {
			(Decimal::from(25), add_on_total(&substitute.additional_services))
		},
		ServiceDetails::CourseBrush(brush) => {
			(Decimal::from(3), add_on_total(&brush.additional_services))
		},
		ServiceDetails::Other(_) => {
			let base = extras
				.base_price
				.ok_or(PricingError::MissingBasePrice(service_type))?;
			(base, Decimal::ZERO)
		},
	};

	let rate = commission_rate(service_type);
	let commissionable = base.checked_add(additional).ok_or(PricingError::Overflow)?;
	let platform_commission = commissionable
		.checked_mul(rate)
		.ok_or(PricingError::Overflow)?
		.round_dp(2);
	let total = commissionable
		.checked_add(extras.boost)
		.ok_or(PricingError::Overflow)?;
	let rider_earnings = (commissionable - platform_commission)
		.checked_add(extras.boost)
		.ok_or(PricingError::Overflow)?;

	Ok(PriceQuote {
		base,
		additional,
		boost: extras.boost,
		total,
		commission_rate: rate,
		platform_commission,
		rider_earnings,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use errand_types::{
		CourseBrushDetails, ExpressDetails, GoodsItem, OtherDetails, SubstituteDetails,
		SupermarketDetails,
	};

	fn dec(s: &str) -> Decimal {
		s.parse().unwrap()
	}

	#[test]
	fn test_express_by_parcel_size() {
		let medium = ServiceDetails::Express(ExpressDetails {
			weight: ParcelSize::Medium,
			..Default::default()
		});
		let q = quote(&medium, &PriceExtras::default()).unwrap();
		assert_eq!(q.total, dec("3.50"));
		assert_eq!(q.platform_commission, dec("1.40"));
		assert_eq!(q.rider_earnings, dec("2.10"));
	}

	#[test]
	fn test_heavy_parcel_uses_agreed_price() {
		let heavy = ServiceDetails::Express(ExpressDetails {
			weight: ParcelSize::Heavy,
			..Default::default()
		});
		assert_eq!(
			quote(&heavy, &PriceExtras::default()).unwrap().total,
			Decimal::ZERO
		);
		let agreed = PriceExtras {
			base_price: Some(dec("20")),
			..Default::default()
		};
		assert_eq!(quote(&heavy, &agreed).unwrap().total, dec("20"));
	}

	#[test]
	fn test_boost_is_not_commissioned() {
		let brush = ServiceDetails::CourseBrush(CourseBrushDetails {
			additional_services: AddOns {
				exam: true,
				homework: false,
				discussion: true,
			},
			..Default::default()
		});
		let extras = PriceExtras {
			boost: dec("10"),
			..Default::default()
		};
		let q = quote(&brush, &extras).unwrap();
		// 3 base + 10 exam + 5 discussion
		assert_eq!(q.base, dec("3"));
		assert_eq!(q.additional, dec("15"));
		assert_eq!(q.total, dec("28"));
		assert_eq!(q.platform_commission, dec("1.80"));
		assert_eq!(q.rider_earnings, dec("26.20"));
	}

	#[test]
	fn test_substitute_base() {
		let substitute = ServiceDetails::Substitute(SubstituteDetails::default());
		let q = quote(&substitute, &PriceExtras::default()).unwrap();
		assert_eq!(q.total, dec("25"));
		assert_eq!(q.platform_commission, dec("2.50"));
	}

	#[test]
	fn test_supermarket_sums_goods() {
		let empty = ServiceDetails::Supermarket(SupermarketDetails::default());
		assert_eq!(
			quote(&empty, &PriceExtras::default()),
			Err(PricingError::EmptyGoodsList)
		);

		let basket = ServiceDetails::Supermarket(SupermarketDetails {
			goods_list: vec![
				GoodsItem {
					name: "water".into(),
					price: dec("2.00"),
					count: 3,
				},
				GoodsItem {
					name: "bread".into(),
					price: dec("4.50"),
					count: 1,
				},
			],
			..Default::default()
		});
		assert_eq!(
			quote(&basket, &PriceExtras::default()).unwrap().total,
			dec("10.50")
		);
	}

	#[test]
	fn test_other_requires_base_price() {
		let other = ServiceDetails::Other(OtherDetails::default());
		assert_eq!(
			quote(&other, &PriceExtras::default()),
			Err(PricingError::MissingBasePrice(ServiceType::Other))
		);
		let extras = PriceExtras {
			base_price: Some(dec("15")),
			..Default::default()
		};
		assert_eq!(
			quote(&other, &extras).unwrap().platform_commission,
			dec("3.00")
		);
	}

	#[test]
	fn test_negative_inputs_rejected() {
		let takeout = ServiceDetails::Takeout(Default::default());
		let extras = PriceExtras {
			boost: dec("-1"),
			..Default::default()
		};
		assert_eq!(
			quote(&takeout, &extras),
			Err(PricingError::Negative("boost"))
		);
	}

	#[test]
	fn test_huge_amounts_are_an_error() {
		let basket = ServiceDetails::Supermarket(SupermarketDetails {
			goods_list: vec![GoodsItem {
				name: "gold".into(),
				price: dec("10000000000000000000000000000"),
				count: 100,
			}],
			..Default::default()
		});
		assert_eq!(
			quote(&basket, &PriceExtras::default()),
			Err(PricingError::Overflow)
		);

		let takeout = ServiceDetails::Takeout(Default::default());
		let extras = PriceExtras {
			boost: Decimal::MAX,
			..Default::default()
		};
		assert_eq!(quote(&takeout, &extras), Err(PricingError::Overflow));
	}
}
