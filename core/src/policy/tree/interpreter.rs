// Phase 6: Decision Tree Interpreter
//
// Evaluates expressions and traverses decision trees to produce policy decisions.
// Implements recursive evaluation of values, computations, and boolean expressions.
// All evaluation is integer (cents/ticks/basis-points) - no floating point anywhere
// in the policy path.

use crate::policy::tree::context::{ContextError, EvalContext};
use crate::policy::tree::types::{
    Computation, DecisionTreeDef, Expression, TreeNode, Value, ValueOrCompute,
};
use crate::policy::{HoldReason, ReleaseDecision};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during tree interpretation
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("Division by zero in computation")]
    DivisionByZero,

    #[error("Invalid literal type: expected integer")]
    InvalidLiteralType,

    #[error("Tree traversal exceeded maximum depth (100)")]
    MaxDepthExceeded,

    #[error("Expected action node, found condition node")]
    ExpectedActionNode,

    #[error("Missing required action parameter: {0}")]
    MissingActionParameter(String),

    #[error("Invalid action parameter type: {0}")]
    InvalidActionParameter(String),

    #[error("Invalid action type: {0}")]
    InvalidActionType(String),

    #[error("Invalid tree: {0}")]
    InvalidTree(String),

    #[error("Context error: {0}")]
    ContextError(#[from] ContextError),
}

// ============================================================================
// VALUE EVALUATION (Phase 6.3)
// ============================================================================

/// Evaluate a value to an integer result
///
/// Resolves field references, parameter references, literals, and computations.
///
/// # Arguments
///
/// * `value` - Value to evaluate
/// * `context` - Evaluation context with field values
/// * `params` - Tree parameters (named constants/thresholds)
///
/// # Returns
///
/// Ok(i64) if evaluation succeeds, Err otherwise
///
/// # Example
///
/// ```rust
/// use rtgs_sim_core::policy::tree::{Value, EvalContext};
/// use rtgs_sim_core::{Agent, Transaction, SimulationState};
/// use rtgs_sim_core::orchestrator::CostRates;
/// use std::collections::HashMap;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let agent = Agent::new("BANK_A".to_string(), 1_000_000, 0);
/// let tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100_000, 0, 100);
/// let state = SimulationState::new(vec![agent.clone()]);
/// let cost_rates = CostRates::default();
/// let context = EvalContext::build(&tx, &agent, &state, 10, &cost_rates, 100, 8_000);
/// let params = HashMap::new();
///
/// let value = Value::Field { field: "balance".to_string() };
/// let result = rtgs_sim_core::policy::tree::evaluate_value(&value, &context, &params)?;
/// assert_eq!(result, 1_000_000);
/// # Ok(())
/// # }
/// ```
pub fn evaluate_value(
    value: &Value,
    context: &EvalContext,
    params: &HashMap<String, i64>,
) -> Result<i64, EvalError> {
    match value {
        // Field reference: Look up in context
        Value::Field { field } => context
            .get_field(field)
            .map_err(|_| EvalError::FieldNotFound(field.clone())),

        // Parameter reference: Look up in tree parameters
        Value::Param { param } => params
            .get(param)
            .copied()
            .ok_or_else(|| EvalError::ParameterNotFound(param.clone())),

        // Literal: Extract integer value
        Value::Literal { value: json_value } => {
            if let Some(int_val) = json_value.as_i64() {
                Ok(int_val)
            } else if let Some(bool_val) = json_value.as_bool() {
                // Convert boolean to integer (true = 1, false = 0)
                Ok(if bool_val { 1 } else { 0 })
            } else {
                Err(EvalError::InvalidLiteralType)
            }
        }

        // Computation: Recursively evaluate arithmetic expression
        Value::Compute { compute } => evaluate_computation(compute, context, params),
    }
}

// ============================================================================
// COMPUTATION EVALUATION (Phase 6.4)
// ============================================================================

/// Evaluate an arithmetic computation
///
/// # Arguments
///
/// * `computation` - Computation to evaluate
/// * `context` - Evaluation context
/// * `params` - Tree parameters
///
/// # Returns
///
/// Ok(i64) if computation succeeds, Err otherwise. Division truncates toward
/// zero like plain integer division; dividing by zero is always fatal.
pub fn evaluate_computation(
    computation: &Computation,
    context: &EvalContext,
    params: &HashMap<String, i64>,
) -> Result<i64, EvalError> {
    match computation {
        Computation::Add { left, right } => {
            let left_val = evaluate_value(left, context, params)?;
            let right_val = evaluate_value(right, context, params)?;
            Ok(left_val + right_val)
        }

        Computation::Subtract { left, right } => {
            let left_val = evaluate_value(left, context, params)?;
            let right_val = evaluate_value(right, context, params)?;
            Ok(left_val - right_val)
        }

        Computation::Multiply { left, right } => {
            let left_val = evaluate_value(left, context, params)?;
            let right_val = evaluate_value(right, context, params)?;
            Ok(left_val * right_val)
        }

        Computation::Divide { left, right } => {
            let left_val = evaluate_value(left, context, params)?;
            let right_val = evaluate_value(right, context, params)?;

            if right_val == 0 {
                return Err(EvalError::DivisionByZero);
            }

            Ok(left_val / right_val)
        }
    }
}

// ============================================================================
// EXPRESSION EVALUATION (Phase 6.5 & 6.6)
// ============================================================================

/// Evaluate a boolean expression
///
/// # Arguments
///
/// * `expr` - Expression to evaluate
/// * `context` - Evaluation context
/// * `params` - Tree parameters
///
/// # Returns
///
/// Ok(bool) if evaluation succeeds, Err otherwise
///
/// # Example
///
/// ```rust
/// use rtgs_sim_core::policy::tree::{Expression, Value, EvalContext};
/// use rtgs_sim_core::{Agent, Transaction, SimulationState};
/// use rtgs_sim_core::orchestrator::CostRates;
/// use std::collections::HashMap;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let agent = Agent::new("BANK_A".to_string(), 1_000_000, 0);
/// let tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100_000, 0, 100);
/// let state = SimulationState::new(vec![agent.clone()]);
/// let cost_rates = CostRates::default();
/// let context = EvalContext::build(&tx, &agent, &state, 10, &cost_rates, 100, 8_000);
/// let params = HashMap::new();
///
/// let expr = Expression::GreaterThan {
///     left: Value::Field { field: "balance".to_string() },
///     right: Value::Field { field: "amount".to_string() },
/// };
/// let result = rtgs_sim_core::policy::tree::evaluate_expression(&expr, &context, &params)?;
/// assert!(result); // 1_000_000 > 100_000
/// # Ok(())
/// # }
/// ```
pub fn evaluate_expression(
    expr: &Expression,
    context: &EvalContext,
    params: &HashMap<String, i64>,
) -> Result<bool, EvalError> {
    match expr {
        // Comparison operators - exact integer comparison, no epsilon needed
        Expression::Equal { left, right } => {
            let left_val = evaluate_value(left, context, params)?;
            let right_val = evaluate_value(right, context, params)?;
            Ok(left_val == right_val)
        }

        Expression::NotEqual { left, right } => {
            let left_val = evaluate_value(left, context, params)?;
            let right_val = evaluate_value(right, context, params)?;
            Ok(left_val != right_val)
        }

        Expression::LessThan { left, right } => {
            let left_val = evaluate_value(left, context, params)?;
            let right_val = evaluate_value(right, context, params)?;
            Ok(left_val < right_val)
        }

        Expression::LessOrEqual { left, right } => {
            let left_val = evaluate_value(left, context, params)?;
            let right_val = evaluate_value(right, context, params)?;
            Ok(left_val <= right_val)
        }

        Expression::GreaterThan { left, right } => {
            let left_val = evaluate_value(left, context, params)?;
            let right_val = evaluate_value(right, context, params)?;
            Ok(left_val > right_val)
        }

        Expression::GreaterOrEqual { left, right } => {
            let left_val = evaluate_value(left, context, params)?;
            let right_val = evaluate_value(right, context, params)?;
            Ok(left_val >= right_val)
        }

        // Logical operators (with short-circuit evaluation)
        Expression::And { conditions } => {
            for condition in conditions {
                if !evaluate_expression(condition, context, params)? {
                    // Short-circuit: if any condition is false, return false immediately
                    return Ok(false);
                }
            }
            // All conditions true
            Ok(true)
        }

        Expression::Or { conditions } => {
            for condition in conditions {
                if evaluate_expression(condition, context, params)? {
                    // Short-circuit: if any condition is true, return true immediately
                    return Ok(true);
                }
            }
            // All conditions false
            Ok(false)
        }

        Expression::Not { condition } => {
            let result = evaluate_expression(condition, context, params)?;
            Ok(!result)
        }
    }
}

// ============================================================================
// TREE TRAVERSAL (Phase 6.7)
// ============================================================================

/// Maximum tree depth to prevent infinite recursion
const MAX_TREE_DEPTH: usize = 100;

/// Traverse a decision tree to find the action node
///
/// Evaluates condition nodes recursively until reaching an action node.
/// Implements depth limiting to prevent infinite recursion.
///
/// # Arguments
///
/// * `tree` - Decision tree definition
/// * `context` - Evaluation context
///
/// # Returns
///
/// Ok(&TreeNode::Action) if traversal succeeds, Err otherwise
///
/// # Example
///
/// ```rust
/// use rtgs_sim_core::policy::tree::{DecisionTreeDef, EvalContext, traverse_tree};
/// use rtgs_sim_core::{Agent, Transaction, SimulationState};
/// use rtgs_sim_core::orchestrator::CostRates;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let agent = Agent::new("BANK_A".to_string(), 1_000_000, 0);
/// let tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100_000, 0, 100);
/// let state = SimulationState::new(vec![agent.clone()]);
/// let cost_rates = CostRates::default();
/// let context = EvalContext::build(&tx, &agent, &state, 10, &cost_rates, 100, 8_000);
///
/// // Simple always-release policy
/// let json = r#"{
///   "version": "1.0",
///   "policy_id": "test_policy",
///   "payment_tree": {
///     "type": "action",
///     "node_id": "A1",
///     "action": "Release"
///   }
/// }"#;
/// let tree: DecisionTreeDef = serde_json::from_str(json)?;
/// let action_node = traverse_tree(&tree, &context)?;
/// # Ok(())
/// # }
/// ```
pub fn traverse_tree<'a>(
    tree: &'a DecisionTreeDef,
    context: &EvalContext,
) -> Result<&'a TreeNode, EvalError> {
    // For backward compatibility, traverse payment_tree by default
    let root = tree
        .payment_tree
        .as_ref()
        .ok_or_else(|| EvalError::InvalidTree("payment_tree is not defined".to_string()))?;
    traverse_node(root, context, &tree.parameters, 0)
}

/// Traverse the strategic collateral tree to reach an action node.
///
/// Returns the terminal action node reached.
/// Returns error if strategic_collateral_tree is not defined.
pub fn traverse_strategic_collateral_tree<'a>(
    tree: &'a DecisionTreeDef,
    context: &EvalContext,
) -> Result<&'a TreeNode, EvalError> {
    let root = tree.strategic_collateral_tree.as_ref().ok_or_else(|| {
        EvalError::InvalidTree("strategic_collateral_tree is not defined".to_string())
    })?;
    traverse_node(root, context, &tree.parameters, 0)
}

/// Traverse the end-of-tick collateral tree to reach an action node.
///
/// Returns the terminal action node reached.
/// Returns error if end_of_tick_collateral_tree is not defined.
pub fn traverse_end_of_tick_collateral_tree<'a>(
    tree: &'a DecisionTreeDef,
    context: &EvalContext,
) -> Result<&'a TreeNode, EvalError> {
    let root = tree.end_of_tick_collateral_tree.as_ref().ok_or_else(|| {
        EvalError::InvalidTree("end_of_tick_collateral_tree is not defined".to_string())
    })?;
    traverse_node(root, context, &tree.parameters, 0)
}

/// Internal recursive tree traversal with depth tracking
fn traverse_node<'a>(
    node: &'a TreeNode,
    context: &EvalContext,
    params: &HashMap<String, i64>,
    depth: usize,
) -> Result<&'a TreeNode, EvalError> {
    // Check depth limit
    if depth > MAX_TREE_DEPTH {
        return Err(EvalError::MaxDepthExceeded);
    }

    match node {
        TreeNode::Action { .. } => {
            // Reached action node, return it
            Ok(node)
        }

        TreeNode::Condition {
            condition,
            on_true,
            on_false,
            ..
        } => {
            // Evaluate condition
            let result = evaluate_expression(condition, context, params)?;

            // Traverse appropriate branch
            let next_node = if result { on_true } else { on_false };
            traverse_node(next_node, context, params, depth + 1)
        }
    }
}

// ============================================================================
// ACTION BUILDING (Phase 6.8)
// ============================================================================

/// Build a ReleaseDecision from an action node
///
/// Converts ActionType and its parameters into a policy decision.
/// Action parameters are evaluated using the context (e.g., computing num_splits).
///
/// # Arguments
///
/// * `action_node` - Action node from tree traversal
/// * `tx_id` - Transaction ID to include in decision
/// * `context` - Evaluation context
/// * `params` - Tree parameters
///
/// # Returns
///
/// Ok(ReleaseDecision) if conversion succeeds, Err otherwise
///
/// # Example
///
/// ```rust
/// use rtgs_sim_core::policy::tree::{build_decision, TreeNode, ActionType, EvalContext};
/// use rtgs_sim_core::{Agent, Transaction, SimulationState};
/// use rtgs_sim_core::orchestrator::CostRates;
/// use std::collections::HashMap;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let agent = Agent::new("BANK_A".to_string(), 1_000_000, 0);
/// let tx = Transaction::new("BANK_A".to_string(), "BANK_B".to_string(), 100_000, 0, 100);
/// let tx_id = tx.id().to_string();
/// let state = SimulationState::new(vec![agent.clone()]);
/// let cost_rates = CostRates::default();
/// let context = EvalContext::build(&tx, &agent, &state, 10, &cost_rates, 100, 8_000);
///
/// // Create action node directly for testing
/// let action_node = TreeNode::Action {
///     node_id: "A1".to_string(),
///     action: ActionType::Release,
///     parameters: HashMap::new(),
/// };
///
/// let params = HashMap::new();
/// let decision = build_decision(&action_node, tx_id, &context, &params)?;
/// # Ok(())
/// # }
/// ```
pub fn build_decision(
    action_node: &TreeNode,
    tx_id: String,
    context: &EvalContext,
    params: &HashMap<String, i64>,
) -> Result<ReleaseDecision, EvalError> {
    use crate::policy::tree::types::ActionType;

    // Verify this is an action node
    let (action, action_params) = match action_node {
        TreeNode::Action {
            action, parameters, ..
        } => (action, parameters),
        TreeNode::Condition { .. } => {
            return Err(EvalError::ExpectedActionNode);
        }
    };

    // Convert ActionType to ReleaseDecision
    match action {
        ActionType::Release => {
            // Parse optional RTGS flags

            // Parse priority_flag parameter (optional)
            let priority_override = if let Some(priority_flag_value) = action_params.get("priority_flag") {
                // Extract string value from ValueOrCompute
                match priority_flag_value {
                    ValueOrCompute::Direct { value } => {
                        if let Some(flag_str) = value.as_str() {
                            // Map priority string to numeric value
                            let priority = match flag_str {
                                "HIGH" => 10,
                                "MEDIUM" => 5,
                                "LOW" => 1,
                                _ => 5, // Default to MEDIUM for invalid values
                            };
                            Some(priority)
                        } else {
                            None
                        }
                    }
                    _ => None,
                }
            } else {
                None
            };

            // Parse timed_for_tick parameter (optional)
            let target_tick = if action_params.contains_key("timed_for_tick") {
                let tick = evaluate_action_parameter(action_params, "timed_for_tick", context, params)?;
                Some(tick.max(0) as usize)
            } else {
                None
            };

            Ok(ReleaseDecision::SubmitFull {
                tx_id,
                priority_override,
                target_tick,
            })
        }

        ActionType::Split => {
            // Split transaction into num_splits parts
            let num_splits =
                evaluate_action_parameter(action_params, "num_splits", context, params)?;
            let num_splits_usize = num_splits.max(0) as usize;

            if num_splits_usize < 2 {
                return Err(EvalError::InvalidActionParameter(
                    "num_splits must be >= 2".to_string(),
                ));
            }

            Ok(ReleaseDecision::SubmitPartial {
                tx_id,
                num_splits: num_splits_usize,
            })
        }

        ActionType::Hold => {
            // Parse reason parameter if provided
            let reason = if let Some(reason_value) = action_params.get("reason") {
                // Extract string from ValueOrCompute
                match reason_value {
                    ValueOrCompute::Direct { value } => {
                        if let Some(reason_str) = value.as_str() {
                            match reason_str {
                                "InsufficientLiquidity" => HoldReason::InsufficientLiquidity,
                                "AwaitingInflows" => HoldReason::AwaitingInflows,
                                "LowPriority" => HoldReason::LowPriority,
                                "NearDeadline" => {
                                    // Get ticks_remaining from context
                                    let ticks_remaining = context
                                        .get_field("ticks_to_deadline")
                                        .unwrap_or(0)
                                        .max(0) as usize;
                                    HoldReason::NearDeadline { ticks_remaining }
                                }
                                other => HoldReason::Custom(other.to_string()),
                            }
                        } else {
                            HoldReason::Custom("Policy decision".to_string())
                        }
                    }
                    _ => HoldReason::Custom("Policy decision".to_string()),
                }
            } else {
                HoldReason::Custom("Policy decision".to_string())
            };

            Ok(ReleaseDecision::Hold { tx_id, reason })
        }

        ActionType::Drop => Ok(ReleaseDecision::Drop { tx_id }),

        // Collateral actions are not valid in payment decision context
        // These should only appear in collateral-specific decision trees
        ActionType::PostCollateral
        | ActionType::WithdrawCollateral
        | ActionType::HoldCollateral => Err(EvalError::InvalidActionType(format!(
            "Collateral action {:?} cannot be used in payment release decision tree. \
             Collateral actions require separate tree evaluation.",
            action
        ))),
    }
}

/// Build a CollateralDecision from an action node (Phase 8.2)
///
/// Converts collateral ActionType and its parameters into a collateral decision.
/// Action parameters are evaluated using the context.
///
/// # Arguments
///
/// * `action_node` - Action node from tree traversal
/// * `context` - Evaluation context
/// * `params` - Tree parameters
///
/// # Returns
///
/// Ok(CollateralDecision) if conversion succeeds, Err otherwise
pub fn build_collateral_decision(
    action_node: &TreeNode,
    context: &EvalContext,
    params: &HashMap<String, i64>,
) -> Result<crate::policy::CollateralDecision, EvalError> {
    use crate::policy::tree::types::ActionType;
    use crate::policy::{CollateralDecision, CollateralReason};

    // Verify this is an action node
    let (action, action_params) = match action_node {
        TreeNode::Action {
            action, parameters, ..
        } => (action, parameters),
        TreeNode::Condition { .. } => {
            return Err(EvalError::ExpectedActionNode);
        }
    };

    // Convert ActionType to CollateralDecision
    match action {
        ActionType::PostCollateral => {
            // Extract amount parameter (required)
            let amount = evaluate_action_parameter(action_params, "amount", context, params)?;

            // If amount is zero or negative, treat as no-op (hold)
            if amount <= 0 {
                return Ok(CollateralDecision::Hold);
            }

            // Extract reason parameter (required)
            let reason = extract_collateral_reason(action_params, context)?;

            // Extract optional auto_withdraw_after_ticks parameter
            let auto_withdraw_after_ticks = if action_params.contains_key("auto_withdraw_after_ticks") {
                let ticks = evaluate_action_parameter(action_params, "auto_withdraw_after_ticks", context, params)?;
                if ticks > 0 {
                    Some(ticks as usize)
                } else {
                    None
                }
            } else {
                None
            };

            Ok(CollateralDecision::Post {
                amount,
                reason,
                auto_withdraw_after_ticks,
            })
        }

        ActionType::WithdrawCollateral => {
            // Extract amount parameter (required)
            let amount = evaluate_action_parameter(action_params, "amount", context, params)?;

            // If amount is zero or negative, treat as no-op (hold)
            if amount <= 0 {
                return Ok(CollateralDecision::Hold);
            }

            // Extract reason parameter (required)
            let reason = extract_collateral_reason(action_params, context)?;

            Ok(CollateralDecision::Withdraw { amount, reason })
        }

        ActionType::HoldCollateral => {
            // No parameters needed
            Ok(CollateralDecision::Hold)
        }

        // Payment actions are not valid in collateral decision context
        ActionType::Release | ActionType::Split | ActionType::Hold | ActionType::Drop => {
            Err(EvalError::InvalidActionType(format!(
                "Payment action {:?} cannot be used in collateral decision tree. \
                 These actions require separate tree evaluation.",
                action
            )))
        }
    }
}

/// Extract CollateralReason from action parameters
fn extract_collateral_reason(
    action_params: &HashMap<String, ValueOrCompute>,
    _context: &EvalContext,
) -> Result<crate::policy::CollateralReason, EvalError> {
    use crate::policy::CollateralReason;

    let reason = if let Some(reason_value) = action_params.get("reason") {
        match reason_value {
            ValueOrCompute::Direct { value } => {
                if let Some(reason_str) = value.as_str() {
                    match reason_str {
                        "UrgentLiquidityNeed" => CollateralReason::UrgentLiquidityNeed,
                        "PreemptivePosting" => CollateralReason::PreemptivePosting,
                        "LiquidityRestored" => CollateralReason::LiquidityRestored,
                        "EndOfDayCleanup" => CollateralReason::EndOfDayCleanup,
                        "DeadlineEmergency" => CollateralReason::DeadlineEmergency,
                        "CostOptimization" => CollateralReason::CostOptimization,
                        _ => CollateralReason::UrgentLiquidityNeed, // Default
                    }
                } else {
                    CollateralReason::UrgentLiquidityNeed // Default
                }
            }
            _ => CollateralReason::UrgentLiquidityNeed, // Default
        }
    } else {
        // Reason is optional, default to UrgentLiquidityNeed
        CollateralReason::UrgentLiquidityNeed
    };

    Ok(reason)
}

/// Evaluate an action parameter value
///
/// Action parameters can be literals, field references, param references, or computations.
fn evaluate_action_parameter(
    action_params: &HashMap<String, ValueOrCompute>,
    param_name: &str,
    context: &EvalContext,
    params: &HashMap<String, i64>,
) -> Result<i64, EvalError> {
    let value_or_compute = action_params
        .get(param_name)
        .ok_or_else(|| EvalError::MissingActionParameter(param_name.to_string()))?;

    match value_or_compute {
        ValueOrCompute::Direct { value } => {
            // Direct literal value
            if let Some(int) = value.as_i64() {
                Ok(int)
            } else if let Some(b) = value.as_bool() {
                Ok(if b { 1 } else { 0 })
            } else {
                Err(EvalError::InvalidActionParameter(param_name.to_string()))
            }
        }

        ValueOrCompute::Field { field } => {
            // Field reference
            context
                .get_field(field)
                .map_err(|_| EvalError::FieldNotFound(field.clone()))
        }

        ValueOrCompute::Param { param } => {
            // Parameter reference
            params
                .get(param)
                .copied()
                .ok_or_else(|| EvalError::ParameterNotFound(param.clone()))
        }

        ValueOrCompute::Compute { compute } => {
            // Computation
            evaluate_computation(compute, context, params)
        }
    }
}

// ============================================================================
// TESTS - Phase 6.3, 6.4, 6.5, 6.6, 6.7, 6.8
// ============================================================================
